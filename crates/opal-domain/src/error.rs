use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid version topic name: {0}")]
    InvalidTopicName(String),

    #[error("store '{store}' has no version {version}")]
    VersionNotFound { store: String, version: u64 },
}
