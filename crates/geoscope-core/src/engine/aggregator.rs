use crate::bank::{select_prompts, suggest_client};
use crate::errors::{ConfigError, QueryError, RunError};
use crate::extract::{detect_mention, mention_offset, SentimentScorer};
use crate::model::{
    now_micros, Observation, PromptRecord, PromptSummary, RawResponses, RunReport, RunStatus,
    Settings,
};
use crate::providers::ModelAdapter;
use crate::storage::Store;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone)]
pub struct RunPolicy {
    pub runs_per_prompt: u32,
    /// Restricted-quota cap on prompts per invocation.
    pub max_prompts: Option<usize>,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            runs_per_prompt: 1,
            max_prompts: None,
            max_retries: 2,
            retry_delay: Duration::from_secs(20),
            timeout: Duration::from_secs(60),
        }
    }
}

impl RunPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        let retry = settings.retry.clone().unwrap_or_default();
        Self {
            runs_per_prompt: settings.runs_per_prompt.unwrap_or(1),
            max_prompts: settings.max_prompts,
            max_retries: retry.max_retries,
            retry_delay: Duration::from_millis(retry.delay_ms),
            timeout: Duration::from_secs(settings.timeout_seconds.unwrap_or(60)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runs_per_prompt == 0 {
            return Err(ConfigError("runs_per_prompt must be at least 1".into()));
        }
        if self.max_prompts == Some(0) {
            return Err(ConfigError("max_prompts must be at least 1 when set".into()));
        }
        Ok(())
    }
}

/// Advisory progress callback, invoked after each finished prompt.
pub trait ProgressSink: Send + Sync {
    fn on_prompt_done(&self, done: usize, total: usize, prompt_id: i64);
}

pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_prompt_done(&self, done: usize, total: usize, prompt_id: i64) {
        tracing::info!(
            event = "geoscope.run.progress",
            done,
            total,
            prompt_id,
            "prompt {}/{} done",
            done,
            total
        );
    }
}

pub struct Aggregator {
    pub store: Store,
    pub adapter: Arc<dyn ModelAdapter>,
    pub scorer: Arc<dyn SentimentScorer>,
    pub policy: RunPolicy,
    pub progress: Arc<dyn ProgressSink>,
}

impl Aggregator {
    pub fn new(
        store: Store,
        adapter: Arc<dyn ModelAdapter>,
        scorer: Arc<dyn SentimentScorer>,
        policy: RunPolicy,
    ) -> Self {
        Self {
            store,
            adapter,
            scorer,
            policy,
            progress: Arc::new(LogProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs every selected prompt of `client_name` and stores one summary per
    /// prompt.
    ///
    /// Prompts run strictly one after another. A rate limit stops the
    /// invocation: summaries of prompts finished before it are still written,
    /// the interrupted prompt is dropped, and `RunError::RateLimited` is
    /// returned.
    pub async fn run_client(
        &self,
        bank: &[PromptRecord],
        client_name: &str,
    ) -> Result<RunReport, RunError> {
        self.policy.validate()?;
        let client = client_name.trim();
        if client.is_empty() {
            return Err(ConfigError("client name must not be empty".into()).into());
        }

        let selected = select_prompts(bank, client, self.policy.max_prompts);
        tracing::info!(
            event = "geoscope.run.start",
            client = %client,
            provider = self.adapter.provider_name(),
            selected = selected.len(),
            runs_per_prompt = self.policy.runs_per_prompt,
            max_prompts = ?self.policy.max_prompts
        );

        if selected.is_empty() {
            let suggestion = suggest_client(bank, client);
            tracing::info!(
                event = "geoscope.run.no_prompts",
                client = %client,
                suggestion = ?suggestion,
                "no prompts found for client in the prompt bank"
            );
            return Ok(RunReport {
                client_name: client.to_string(),
                selected: 0,
                summaries: Vec::new(),
                status: RunStatus::NoPrompts { suggestion },
            });
        }

        // The bank may spell the client several ways; the first selected row
        // names every summary of this run.
        let canonical = selected[0].client_name.trim().to_string();
        let total = selected.len();
        let mut summaries = Vec::with_capacity(total);

        for (idx, record) in selected.iter().enumerate() {
            match self.run_prompt(record, &canonical).await {
                Ok(summary) => summaries.push(summary),
                Err(message) => {
                    let persisted = self
                        .store
                        .upsert(&summaries)
                        .map_err(|e| e.context("failed to flush summaries after rate limit"))?;
                    tracing::warn!(
                        event = "geoscope.run.rate_limited",
                        client = %client,
                        prompt_id = record.prompt_id,
                        persisted,
                        total,
                        "stopping run early: {}",
                        message
                    );
                    return Err(RunError::RateLimited {
                        prompt_id: record.prompt_id,
                        persisted,
                        selected: total,
                        message,
                    });
                }
            }
            self.progress.on_prompt_done(idx + 1, total, record.prompt_id);
        }

        let written = self.store.upsert(&summaries)?;
        tracing::info!(
            event = "geoscope.run.saved",
            client = %client,
            written,
            "saved {} summaries",
            written
        );

        Ok(RunReport {
            client_name: canonical,
            selected: total,
            summaries,
            status: RunStatus::Completed,
        })
    }

    /// Err carries the rate-limit message.
    async fn run_prompt(
        &self,
        record: &PromptRecord,
        client_name: &str,
    ) -> Result<PromptSummary, String> {
        let runs = self.policy.runs_per_prompt;
        let mut observations = Vec::with_capacity(runs as usize);

        for run in 0..runs {
            match self.query_with_retry(&record.prompt_text).await {
                Ok(text) => observations.push(Observation::completed(text)),
                Err(QueryError::RateLimited(msg)) => return Err(msg),
                Err(QueryError::Transient(msg)) => {
                    tracing::warn!(
                        event = "geoscope.run.observation_failed",
                        prompt_id = record.prompt_id,
                        run = run + 1,
                        error = %msg
                    );
                    observations.push(Observation::failed());
                }
            }
        }

        Ok(summarize(
            record,
            client_name,
            &observations,
            runs,
            self.scorer.as_ref(),
            now_micros(),
        ))
    }

    async fn query_with_retry(&self, prompt: &str) -> Result<String, QueryError> {
        let mut retries = 0;
        loop {
            let result = match timeout(self.policy.timeout, self.adapter.generate(prompt)).await {
                Ok(r) => r,
                Err(_) => Err(QueryError::Transient(format!(
                    "timed out after {}s",
                    self.policy.timeout.as_secs_f64()
                ))),
            };

            match result {
                Ok(text) => return Ok(text),
                Err(QueryError::Transient(msg)) if retries < self.policy.max_retries => {
                    retries += 1;
                    tracing::debug!(
                        event = "geoscope.query.retry",
                        retry = retries,
                        max_retries = self.policy.max_retries,
                        error = %msg
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Folds the observations of one prompt into its summary, keyed by
/// `client_name`. Failed observations count toward `runs_requested` only.
pub fn summarize(
    record: &PromptRecord,
    client_name: &str,
    observations: &[Observation],
    runs_requested: u32,
    scorer: &dyn SentimentScorer,
    timestamp: DateTime<Utc>,
) -> PromptSummary {
    let client_name = client_name.trim();
    let completed: Vec<&str> = observations
        .iter()
        .filter(|o| o.succeeded)
        .map(|o| o.response_text.as_str())
        .collect();

    let mut appearances = 0u32;
    let mut positions = Vec::new();
    let mut sentiments = Vec::with_capacity(completed.len());

    for text in &completed {
        if detect_mention(text, client_name) {
            appearances += 1;
            if let Some(pos) = mention_offset(text, client_name) {
                positions.push(pos);
            }
        }
        sentiments.push(score_text(scorer, text));
    }

    let appearance_percent = if runs_requested == 0 {
        0.0
    } else {
        appearances as f64 / runs_requested as f64 * 100.0
    };

    PromptSummary {
        client_name: client_name.to_string(),
        prompt_id: record.prompt_id,
        prompt_text: record.prompt_text.clone(),
        appearances,
        appearance_percent,
        avg_position: mean(&positions),
        avg_sentiment: mean(&sentiments).unwrap_or(0.0),
        runs_requested,
        runs_completed: completed.len() as u32,
        raw_responses: RawResponses::join(&completed),
        timestamp,
    }
}

fn score_text(scorer: &dyn SentimentScorer, text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }
    let s = scorer.score(text);
    if s.is_finite() {
        s.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f64);

    impl SentimentScorer for Fixed {
        fn score(&self, _text: &str) -> f64 {
            self.0
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn record() -> PromptRecord {
        PromptRecord {
            prompt_id: 3,
            prompt_text: "Best dentist in Austin?".into(),
            client_name: " Acme Dental ".into(),
        }
    }

    #[test]
    fn summarize_scopes_to_completed_observations() {
        let obs = vec![
            Observation::completed("Acme Dental is great."),
            Observation::failed(),
            Observation::completed("Try Bright Smiles."),
        ];
        let s = summarize(&record(), "Acme Dental", &obs, 3, &Fixed(0.5), now_micros());
        assert_eq!(s.client_name, "Acme Dental");
        assert_eq!(s.appearances, 1);
        assert_eq!(s.runs_completed, 2);
        assert_eq!(s.runs_requested, 3);
        assert_eq!(s.appearance_percent, 1.0 / 3.0 * 100.0);
        assert_eq!(s.avg_position, Some(0.0));
        assert_eq!(s.avg_sentiment, 0.5);
        assert_eq!(
            s.raw_responses.as_str(),
            "Acme Dental is great. ||| Try Bright Smiles."
        );
    }

    #[test]
    fn summarize_all_failed_uses_neutral_defaults() {
        let obs = vec![Observation::failed(), Observation::failed()];
        let s = summarize(&record(), "Acme Dental", &obs, 2, &Fixed(0.9), now_micros());
        assert_eq!(s.appearances, 0);
        assert_eq!(s.appearance_percent, 0.0);
        assert_eq!(s.avg_position, None);
        assert_eq!(s.avg_sentiment, 0.0);
        assert_eq!(s.runs_completed, 0);
        assert!(s.raw_responses.is_empty());
    }

    #[test]
    fn summarize_clamps_out_of_range_scores() {
        let obs = vec![Observation::completed("words"), Observation::completed("")];
        let s = summarize(&record(), "Acme Dental", &obs, 2, &Fixed(4.0), now_micros());
        // "" scores neutral, "words" is clamped to 1.0.
        assert_eq!(s.avg_sentiment, 0.5);
        let s = summarize(&record(), "Acme Dental", &obs, 2, &Fixed(f64::NAN), now_micros());
        assert_eq!(s.avg_sentiment, 0.0);
    }

    #[test]
    fn policy_validation() {
        assert!(RunPolicy::default().validate().is_ok());
        let zero_runs = RunPolicy {
            runs_per_prompt: 0,
            ..RunPolicy::default()
        };
        assert!(zero_runs.validate().is_err());
        let zero_cap = RunPolicy {
            max_prompts: Some(0),
            ..RunPolicy::default()
        };
        assert!(zero_cap.validate().is_err());
    }

    #[test]
    fn policy_from_settings_uses_defaults() {
        let p = RunPolicy::from_settings(&Settings::default());
        assert_eq!(p.runs_per_prompt, 1);
        assert_eq!(p.max_retries, 2);
        assert_eq!(p.retry_delay, Duration::from_millis(20_000));
        assert_eq!(p.timeout, Duration::from_secs(60));
    }
}
