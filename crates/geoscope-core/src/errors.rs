use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

/// Failure of a single model query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Shared quota exhausted. Ends the whole invocation.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Worth retrying after a fixed delay.
    #[error("transient error: {0}")]
    Transient(String),
}

impl QueryError {
    /// Maps a provider error message onto a kind.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let rate_limited = message.contains("RESOURCE_EXHAUSTED")
            || lower.contains("rate-limit")
            || lower.contains("rate limit")
            || lower.contains("rate_limited")
            || lower.contains("quota")
            || lower.contains("429");
        if rate_limited {
            QueryError::RateLimited(message)
        } else {
            QueryError::Transient(message)
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, QueryError::RateLimited(_))
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(
        "rate limited at prompt {prompt_id}: {message} ({persisted} of {selected} summaries persisted)"
    )]
    RateLimited {
        prompt_id: i64,
        persisted: usize,
        selected: usize,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognises_quota_messages() {
        assert!(QueryError::classify("429 RESOURCE_EXHAUSTED").is_rate_limited());
        assert!(QueryError::classify("You exceeded your current Quota").is_rate_limited());
        assert!(QueryError::classify("see https://ai.google.dev/gemini-api/docs/rate-limits")
            .is_rate_limited());
        assert_eq!(
            QueryError::classify("connection reset by peer"),
            QueryError::Transient("connection reset by peer".into())
        );
    }
}
