use opal_decider::DeciderError;
use opal_domain::DomainError;
use opal_store::PushStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("offline push for topic '{0}' does not exist")]
    PushNotFound(String),

    #[error("offline push for topic '{0}' already exists and is not in error status")]
    PushAlreadyExists(String),

    #[error("store '{0}' does not exist")]
    StoreNotFound(String),

    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("push store error: {0}")]
    Store(#[from] PushStoreError),

    #[error("decider error: {0}")]
    Decider(#[from] DeciderError),

    #[error("internal monitor error: {0}")]
    Internal(String),
}
