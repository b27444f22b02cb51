use thiserror::Error;

/// Failures reported by a catalog store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Catalog store unavailable: {0}")]
    Unavailable(String),

    #[error("Catalog query failed: {0}")]
    Query(String),

    #[error("Catalog write failed: {0}")]
    Write(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by a notification channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Topic {0} is closed")]
    TopicClosed(String),
}

pub type PublishResult<T> = std::result::Result<T, PublishError>;
