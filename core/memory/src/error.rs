use thiserror::Error;

/// Client-visible failures of the memory layer. Persistence trouble is
/// deliberately absent: journal writes degrade with a logged warning and
/// never abort the in-memory mutation.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("topic {0} not found")]
    TopicNotFound(String),

    #[error("invalid delta: {0}")]
    InvalidDelta(String),
}
