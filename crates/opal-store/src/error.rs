use opal_domain::ExecutionStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushStoreError {
    #[error("offline push status for topic '{0}' does not exist")]
    PushNotFound(String),

    #[error("illegal push status transition {from} -> {to} for topic '{topic}'")]
    IllegalStatusTransition {
        topic: String,
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("topic '{topic}' has no partition {partition}")]
    UnknownPartition { topic: String, partition: u32 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal accessor error: {0}")]
    Internal(String),
}
