use super::ModelAdapter;
use crate::errors::QueryError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum ReplayStep {
    Answer(String),
    Fail(QueryError),
}

/// Serves recorded answers from a JSONL file.
///
/// A prompt may appear on several lines; successive calls walk those lines in
/// order and wrap around. Lines with an `error` field replay a failure.
#[derive(Clone)]
pub struct ReplayAdapter {
    steps: Arc<HashMap<String, Vec<ReplayStep>>>,
    cursor: Arc<Mutex<HashMap<String, usize>>>,
}

#[derive(serde::Deserialize)]
struct ReplayEntry {
    schema_version: Option<u32>,
    prompt: String,
    response: Option<String>,
    text: Option<String>,
    error: Option<String>,
}

impl ReplayAdapter {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to open replay file {}: {}", path.display(), e))?;
        Self::from_jsonl(&raw)
    }

    pub fn from_jsonl(raw: &str) -> anyhow::Result<Self> {
        let mut steps: HashMap<String, Vec<ReplayStep>> = HashMap::new();

        for (i, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: ReplayEntry = serde_json::from_str(line)
                .map_err(|e| anyhow::anyhow!("line {}: failed to parse replay entry: {}", i + 1, e))?;

            if let Some(v) = entry.schema_version {
                if v != 1 {
                    anyhow::bail!("line {}: unsupported schema_version {}", i + 1, v);
                }
            }

            let step = match (entry.error, entry.response.or(entry.text)) {
                (Some(err), _) => ReplayStep::Fail(match err.as_str() {
                    "rate_limited" => QueryError::RateLimited("replayed rate limit".into()),
                    "transient" => QueryError::Transient("replayed transient failure".into()),
                    other => QueryError::classify(other),
                }),
                (None, Some(text)) => ReplayStep::Answer(text),
                (None, None) => {
                    anyhow::bail!("line {}: missing `response`/`text`/`error` field", i + 1)
                }
            };
            steps.entry(entry.prompt).or_default().push(step);
        }

        Ok(Self {
            steps: Arc::new(steps),
            cursor: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn prompt_count(&self) -> usize {
        self.steps.len()
    }
}

#[async_trait]
impl ModelAdapter for ReplayAdapter {
    async fn generate(&self, prompt: &str) -> Result<String, QueryError> {
        let Some(recorded) = self.steps.get(prompt).filter(|v| !v.is_empty()) else {
            return Err(QueryError::Transient(format!(
                "replay miss: no recorded response for prompt '{}'",
                prompt
            )));
        };

        let idx = {
            let mut cursor = self
                .cursor
                .lock()
                .map_err(|_| QueryError::Transient("replay cursor lock poisoned".into()))?;
            let pos = cursor.entry(prompt.to_string()).or_insert(0);
            let idx = *pos % recorded.len();
            *pos += 1;
            idx
        };

        match &recorded[idx] {
            ReplayStep::Answer(text) => Ok(text.clone()),
            ReplayStep::Fail(e) => Err(e.clone()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "replay"
    }
}
