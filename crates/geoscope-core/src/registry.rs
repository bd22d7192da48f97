use crate::model::normalize_client;
use crate::storage::Store;
use anyhow::Context;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Client names kept in a one-column CSV file, next to whatever the store has
/// already seen. Appending is idempotent: names are compared trimmed and
/// case-insensitively.
pub struct ClientRegistry {
    path: PathBuf,
}

#[derive(serde::Deserialize, serde::Serialize)]
struct ClientRow {
    client_name: String,
}

impl ClientRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names in the file, in file order. A missing file is an empty registry.
    pub fn entries(&self) -> anyhow::Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        // Clients files may carry more profile columns than the name.
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("failed to open clients file {}", self.path.display()))?;
        let mut out = Vec::new();
        for row in rdr.deserialize::<ClientRow>() {
            let row = row.with_context(|| format!("bad row in {}", self.path.display()))?;
            let name = row.client_name.trim();
            if !name.is_empty() {
                out.push(name.to_string());
            }
        }
        Ok(out)
    }

    /// Appends `name` unless it is already listed. Returns whether it was added.
    pub fn add(&self, name: &str) -> anyhow::Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("client name must not be empty");
        }
        let wanted = normalize_client(name);
        if self
            .entries()?
            .iter()
            .any(|existing| normalize_client(existing) == wanted)
        {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let fresh = !self.path.exists() || std::fs::metadata(&self.path)?.len() == 0;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open clients file {}", self.path.display()))?;

        if fresh {
            let mut wtr = csv::Writer::from_writer(file);
            wtr.serialize(ClientRow {
                client_name: name.to_string(),
            })?;
            wtr.flush()?;
        } else {
            ensure_trailing_newline(&self.path)?;
            let mut wtr = csv::WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_writer(file);
            wtr.write_record([name])?;
            wtr.flush()?;
        }

        tracing::info!(event = "geoscope.registry.added", client = %name, path = %self.path.display());
        Ok(true)
    }

    /// Union of registered names and the store's clients, sorted.
    pub fn known_clients(&self, store: Option<&Store>) -> anyhow::Result<BTreeSet<String>> {
        let mut out: BTreeSet<String> = self.entries()?.into_iter().collect();
        if let Some(store) = store {
            out.extend(store.list_known_clients()?);
        }
        Ok(out)
    }
}

/// Spelling of `input` among `known`, matched trimmed and case-insensitively.
pub fn canonical_name<'a, I>(known: I, input: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let wanted = normalize_client(input);
    known
        .into_iter()
        .find(|k| normalize_client(k) == wanted)
        .cloned()
}

fn ensure_trailing_newline(path: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path)?;
    if bytes.last().is_some_and(|b| *b != b'\n') {
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new().append(true).open(path)?;
        f.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_is_idempotent() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let reg = ClientRegistry::new(dir.path().join("data/clients.csv"));
        assert!(reg.entries()?.is_empty());

        assert!(reg.add("Acme Dental")?);
        assert!(!reg.add("Acme Dental")?);
        assert!(!reg.add("  acme dental ")?);
        assert!(reg.add("Bright Smiles")?);

        assert_eq!(reg.entries()?, vec!["Acme Dental", "Bright Smiles"]);
        Ok(())
    }

    #[test]
    fn add_rejects_blank_names() {
        let dir = tempdir().unwrap();
        let reg = ClientRegistry::new(dir.path().join("clients.csv"));
        assert!(reg.add("   ").is_err());
    }

    #[test]
    fn appends_to_profile_files_without_newline() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("clients.csv");
        std::fs::write(&path, "client_name,city,services_offered\nAcme Dental,Austin,braces")?;
        let reg = ClientRegistry::new(&path);
        assert!(reg.add("Bright Smiles")?);
        assert_eq!(reg.entries()?, vec!["Acme Dental", "Bright Smiles"]);
        Ok(())
    }

    #[test]
    fn union_with_store_clients() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let reg = ClientRegistry::new(dir.path().join("clients.csv"));
        reg.add("Zeta Clinic")?;
        let store = Store::memory()?;
        store.init_schema()?;
        let known = reg.known_clients(Some(&store))?;
        assert_eq!(known.into_iter().collect::<Vec<_>>(), vec!["Zeta Clinic"]);
        Ok(())
    }

    #[test]
    fn canonical_name_matches_case_insensitively() {
        let known: BTreeSet<String> = ["Acme Dental".to_string()].into_iter().collect();
        assert_eq!(canonical_name(&known, " ACME dental"), Some("Acme Dental".into()));
        assert_eq!(canonical_name(&known, "Acme"), None);
    }
}
