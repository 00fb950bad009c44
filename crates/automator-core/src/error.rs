//! Handler error type

use thiserror::Error;

/// Errors raised by action handlers and deferred results
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The handler (or the work it started) failed
    #[error("handler failed: {0}")]
    Failed(String),

    /// The resolver of a deferred result was dropped before settling it
    #[error("deferred result was abandoned before it settled")]
    Abandoned,
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
