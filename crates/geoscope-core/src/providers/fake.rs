use super::ModelAdapter;
use crate::errors::QueryError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Deterministic adapter for tests and dry runs.
///
/// In echo mode every prompt gets a canned answer. In scripted mode calls
/// consume the script in order; once it runs out, the fallback answer is
/// returned.
pub struct FakeAdapter {
    model: String,
    script: Mutex<VecDeque<Result<String, QueryError>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeAdapter {
    pub fn echo(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(script: Vec<Result<String, QueryError>>) -> Self {
        Self {
            model: "fake".to_string(),
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, retries included.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelAdapter for FakeAdapter {
    async fn generate(&self, prompt: &str) -> Result<String, QueryError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(prompt.to_string());
        }
        let next = self
            .script
            .lock()
            .map_err(|_| QueryError::Transient("fake script lock poisoned".into()))?
            .pop_front();
        match next {
            Some(step) => step,
            None => Ok(format!("hello from {} :: {}", self.model, prompt)),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
