use crate::errors::{ConfigError, QueryError};
use crate::model::{ProviderConfig, ProviderKind};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub mod fake;
pub mod replay;

/// The assistant being audited: one prompt in, one answer out.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, QueryError>;
    fn provider_name(&self) -> &'static str;
}

/// Builds the adapter named in the config. Paths must already be resolved.
pub fn build_adapter(cfg: &ProviderConfig) -> Result<Arc<dyn ModelAdapter>, ConfigError> {
    match cfg.kind {
        ProviderKind::Fake => {
            let model = cfg.model.clone().unwrap_or_else(|| "fake".to_string());
            Ok(Arc::new(fake::FakeAdapter::echo(model)))
        }
        ProviderKind::Replay => {
            let path = cfg.path.as_deref().ok_or_else(|| {
                ConfigError("provider 'replay' requires `provider.path`".to_string())
            })?;
            let adapter = replay::ReplayAdapter::from_path(Path::new(path))
                .map_err(|e| ConfigError(format!("{:#}", e)))?;
            Ok(Arc::new(adapter))
        }
    }
}
