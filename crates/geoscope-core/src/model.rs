use anyhow::ensure;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Placed between raw response texts when a summary is persisted.
pub const RESPONSE_SEPARATOR: &str = " ||| ";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    #[serde(default, rename = "configVersion", alias = "version")]
    pub version: u32,
    pub prompt_bank: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients_file: Option<String>,
    #[serde(default = "default_db")]
    pub db: String,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default, skip_serializing_if = "is_default_settings")]
    pub settings: Settings,
    #[serde(default)]
    pub sentiment: SentimentConfig,
}

fn default_db() -> String {
    "data/geo_results.db".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Fake,
    Replay,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs_per_prompt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_prompts: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySettings>,
}

fn is_default_settings(s: &Settings) -> bool {
    s == &Settings::default()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_delay_ms() -> u64 {
    20_000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SentimentConfig {
    #[serde(default)]
    pub kind: SentimentKind,
    /// Extra words added to the built-in lists of the keyword scorer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positive: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub negative: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SentimentKind {
    Neutral,
    #[default]
    Keyword,
}

/// One row of the prompt bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    pub prompt_id: i64,
    pub prompt_text: String,
    pub client_name: String,
}

impl PromptRecord {
    pub fn belongs_to(&self, client_name: &str) -> bool {
        normalize_client(&self.client_name) == normalize_client(client_name)
    }
}

pub fn normalize_client(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A single query attempt. Only lives for the duration of one prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub response_text: String,
    pub succeeded: bool,
}

impl Observation {
    pub fn completed(text: impl Into<String>) -> Self {
        Self {
            response_text: text.into(),
            succeeded: true,
        }
    }

    pub fn failed() -> Self {
        Self {
            response_text: String::new(),
            succeeded: false,
        }
    }
}

/// Response texts of one summary, joined with [`RESPONSE_SEPARATOR`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawResponses(String);

impl RawResponses {
    pub fn join<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parts: Vec<String> = texts
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        Self(parts.join(RESPONSE_SEPARATOR))
    }

    pub fn from_joined(joined: impl Into<String>) -> Self {
        Self(joined.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Best-effort split for display. A response that itself contains the
    /// separator is split too.
    pub fn split(&self) -> Vec<&str> {
        if self.0.is_empty() {
            return Vec::new();
        }
        self.0.split(RESPONSE_SEPARATOR).collect()
    }
}

/// Aggregated statistics for one (client, prompt) pair as of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSummary {
    pub client_name: String,
    pub prompt_id: i64,
    pub prompt_text: String,
    pub appearances: u32,
    pub appearance_percent: f64,
    pub avg_position: Option<f64>,
    pub avg_sentiment: f64,
    pub runs_requested: u32,
    pub runs_completed: u32,
    pub raw_responses: RawResponses,
    pub timestamp: DateTime<Utc>,
}

impl PromptSummary {
    /// Checks the relations a summary built from real runs always satisfies.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.client_name.trim().is_empty(), "client_name is empty");
        ensure!(self.runs_requested >= 1, "runs_requested must be at least 1");
        ensure!(
            self.runs_completed <= self.runs_requested,
            "runs_completed {} exceeds runs_requested {}",
            self.runs_completed,
            self.runs_requested
        );
        ensure!(
            self.appearances <= self.runs_completed,
            "appearances {} exceeds runs_completed {}",
            self.appearances,
            self.runs_completed
        );

        let expected = f64::from(self.appearances) / f64::from(self.runs_requested) * 100.0;
        ensure!(
            (self.appearance_percent - expected).abs() < 1e-6,
            "appearance_percent {} does not match {}/{} runs",
            self.appearance_percent,
            self.appearances,
            self.runs_requested
        );

        if let Some(p) = self.avg_position {
            ensure!((0.0..=1.0).contains(&p), "avg_position {} is outside [0, 1]", p);
        }
        if self.appearances == 0 {
            ensure!(
                self.avg_position.is_none(),
                "avg_position is set but the client never appeared"
            );
        }
        ensure!(
            (-1.0..=1.0).contains(&self.avg_sentiment),
            "avg_sentiment {} is outside [-1, 1]",
            self.avg_sentiment
        );
        Ok(())
    }
}

/// Current time truncated to the precision the store keeps.
pub fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunStatus {
    Completed,
    NoPrompts { suggestion: Option<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub client_name: String,
    pub selected: usize,
    pub summaries: Vec<PromptSummary>,
    #[serde(flatten)]
    pub status: RunStatus,
}
