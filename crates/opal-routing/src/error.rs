use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no partition assignment for topic '{0}'")]
    TopicNotFound(String),

    #[error("internal routing error: {0}")]
    Internal(String),
}
