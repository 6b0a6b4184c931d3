use std::time::Duration;

use thiserror::Error;

/// Failure kinds surfaced by the retrieval core.
///
/// Every public operation returns either a typed value or one of these; none
/// of them use an empty value to mean "failed".
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid chunking parameters, strategy names, or storage settings.
    /// Raised at construction and never retried.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A caller precondition was violated.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The external vector database failed or could not be reached.
    #[error("Vector store unavailable during {operation} ({items} items): {source}")]
    StoreUnavailable {
        operation: &'static str,
        items: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: &'static str, timeout: Duration },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A collaborator outside the core (the embedding provider) failed.
    #[error("Upstream {stage} failed: {source}")]
    Upstream {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Whether a caller may retry the operation with backoff.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::StoreUnavailable { .. } | Error::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
