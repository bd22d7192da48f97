//! Paths in `geoscope.yaml` are relative to the file, not to the shell's
//! working directory.

use crate::model::GeoConfig;
use std::path::{Component, Path, PathBuf};

/// Directory the config was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigDir {
    base: PathBuf,
}

impl ConfigDir {
    pub fn of(config_path: &Path) -> Self {
        let base = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self { base }
    }

    /// Anchors every file the config names: prompt bank, database, clients
    /// file and replay file.
    pub fn apply(&self, cfg: &mut GeoConfig) {
        let fields: [(&str, Option<&mut String>); 4] = [
            ("prompt_bank", Some(&mut cfg.prompt_bank)),
            ("db", Some(&mut cfg.db)),
            ("clients_file", cfg.clients_file.as_mut()),
            ("provider.path", cfg.provider.path.as_mut()),
        ];
        for (field, value) in fields {
            let Some(value) = value else { continue };
            if let Some(anchored) = self.anchor(value) {
                tracing::debug!(field, from = %value, to = %anchored.display(), "resolved config path");
                *value = anchored.to_string_lossy().into_owned();
            }
        }
    }

    /// `raw` joined onto the config directory, or `None` when it stays as
    /// written (blank, absolute, or SQLite's `:memory:`).
    pub fn anchor(&self, raw: &str) -> Option<PathBuf> {
        if raw.trim().is_empty() || raw == ":memory:" {
            return None;
        }
        let rel = Path::new(raw);
        if rel.is_absolute() {
            return None;
        }
        Some(clean_lexically(&self.base.join(rel)))
    }
}

/// Drops `.` and folds `..` into its parent without touching the filesystem.
/// Leading `..` on a relative path has no parent to fold into and is kept.
pub fn clean_lexically(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(c),
            },
            other => parts.push(other),
        }
    }
    parts.iter().map(|c| c.as_os_str()).collect()
}
