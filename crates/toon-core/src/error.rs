//! Error types for toon-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Schema could not be loaded or failed validation
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// An action executor failed
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// An event handler rejected an event
    #[error("handler error: {0}")]
    Handler(String),

    /// The push session backing a handler is gone
    #[error("session closed: {0}")]
    SessionClosed(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while acquiring, parsing or validating a schema document.
///
/// Any of these is fatal at startup: the gateway never serves a partially
/// loaded schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Local file could not be read
    #[error("failed to read schema file '{path}': {source}")]
    Io {
        /// Path that was read
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Remote schema could not be fetched
    #[error("failed to fetch schema from '{url}': {message}")]
    Fetch {
        /// Remote location
        url: String,
        /// Failure description (network error or HTTP status)
        message: String,
    },

    /// Document is neither valid JSON nor valid YAML
    #[error("failed to parse schema document: {0}")]
    Parse(String),

    /// Document parsed but violates a structural rule
    #[error("invalid schema: {0}")]
    Validation(String),
}

/// Failure reported by an [`ActionExecutor`](crate::invocation::ActionExecutor).
///
/// The `Display` form is what HTTP callers receive in `{"error": ...}` and what
/// the action-ended event carries, so variants keep their messages short.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Executor-defined failure
    #[error("{0}")]
    Failed(String),

    /// Upstream request could not be completed
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("upstream returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// Action is not executable as declared
    #[error("invalid action: {0}")]
    InvalidAction(String),
}

impl ExecutionError {
    /// Shorthand for an executor-defined failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
