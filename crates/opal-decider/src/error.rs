use opal_domain::OfflinePushStrategy;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeciderError {
    #[error("no decider registered for strategy: {0}")]
    StrategyNotConfigured(OfflinePushStrategy),
}
