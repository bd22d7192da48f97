use crate::errors::ConfigError;
use crate::extract::{KeywordSentiment, NeutralSentiment, SentimentScorer};
use crate::model::{GeoConfig, ProviderKind, SentimentConfig, SentimentKind};
use std::path::Path;
use std::sync::Arc;

pub mod path_resolver;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

pub fn load_config(path: &Path, strict: bool) -> Result<GeoConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut ignored_keys = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);

    let mut cfg: GeoConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    let meaningful_unknowns: Vec<_> = ignored_keys
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();

    if !meaningful_unknowns.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "Unknown fields detected in strict mode: {:?} (file: {})",
                meaningful_unknowns,
                path.display()
            )));
        }
        tracing::warn!(
            event = "geoscope.config.unknown_fields",
            fields = ?meaningful_unknowns,
            file = %path.display(),
            "ignored unknown config fields"
        );
    }

    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }

    if cfg.prompt_bank.trim().is_empty() {
        return Err(ConfigError("config has no prompt_bank".into()));
    }

    if cfg.provider.kind == ProviderKind::Replay && cfg.provider.path.is_none() {
        return Err(ConfigError(format!(
            "provider 'replay' requires `provider.path` (file: {})",
            path.display()
        )));
    }

    path_resolver::ConfigDir::of(path).apply(&mut cfg);
    Ok(cfg)
}

pub fn build_scorer(cfg: &SentimentConfig) -> Result<Arc<dyn SentimentScorer>, ConfigError> {
    match cfg.kind {
        SentimentKind::Neutral => Ok(Arc::new(NeutralSentiment)),
        SentimentKind::Keyword => {
            let scorer = KeywordSentiment::new(&cfg.positive, &cfg.negative)
                .map_err(|e| ConfigError(format!("sentiment scorer: {}", e)))?;
            Ok(Arc::new(scorer))
        }
    }
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"version: 1
prompt_bank: data/prompt_bank.csv
clients_file: data/clients.csv
db: data/geo_results.db
provider:
  kind: replay
  path: data/responses.jsonl
  model: gemini-2.5-flash
settings:
  runs_per_prompt: 1
  # Restricted-quota mode. Remove for full audits.
  max_prompts: 5
  timeout_seconds: 60
  retry:
    max_retries: 2
    delay_ms: 20000
sentiment:
  kind: keyword
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
