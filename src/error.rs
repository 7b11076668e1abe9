// Typed errors for the library surface.
//
// ConfigError covers pipeline registration and is fatal at startup.
// StoreError covers every call that crosses into the search engine; callers
// decide whether to retry based on `is_retryable`. The binary wraps both in
// anyhow with context.

use thiserror::Error;

/// Errors raised while building the pipeline registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A pipeline, normalizer or filter with this name is already registered.
    #[error("{kind} '{name}' is already registered")]
    DuplicateName { kind: &'static str, name: String },

    /// A filter chain references a filter name that was never defined.
    #[error("pipeline '{pipeline}' references unknown filter '{filter}'")]
    UnknownFilter { pipeline: String, filter: String },

    /// A pipeline or normalizer name that is not in the registry.
    #[error("unknown pipeline '{0}'")]
    UnknownPipeline(String),

    /// Structurally invalid definition (bad n-gram range, empty synonym group, ...).
    #[error("invalid definition '{name}': {reason}")]
    InvalidPipeline { name: String, reason: String },

    /// The analysis definitions file could not be read or parsed.
    #[error("analysis definitions: {0}")]
    Definitions(String),
}

/// Errors raised by a document store adapter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("connection to search engine failed: {0}")]
    ConnectionFailed(String),

    #[error("index '{0}' not found")]
    IndexNotFound(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The engine answered but refused the request.
    #[error("search engine returned {status}: {reason}")]
    Rejected { status: u16, reason: String },
}

impl StoreError {
    /// Whether a caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::ConnectionFailed(_) | StoreError::Timeout(_) => true,
            StoreError::Rejected { status, .. } => *status == 429 || *status >= 500,
            StoreError::IndexNotFound(_) | StoreError::MalformedResponse(_) => false,
        }
    }
}
