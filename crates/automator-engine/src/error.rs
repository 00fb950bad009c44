//! Engine error types

use automator_core::{ActionShape, HandlerError};
use thiserror::Error;

/// Result type for engine operations
pub type AutomatorResult<T> = Result<T, AutomatorError>;

/// Errors that stop a run
#[derive(Debug, Clone, Error)]
pub enum AutomatorError {
    /// No handler is registered for the action's shape
    #[error("unsupported action: no handler registered for {shape} actions")]
    UnsupportedAction { shape: ActionShape },

    /// A handler failed synchronously
    #[error("handler for action {action} failed: {source}")]
    Handler {
        action: String,
        #[source]
        source: HandlerError,
    },

    /// The iteration callback failed synchronously
    #[error("iteration callback failed on iteration {iteration}: {source}")]
    IterationCallback {
        iteration: usize,
        #[source]
        source: HandlerError,
    },

    /// The run's task panicked
    #[error("run panicked: {0}")]
    Panicked(String),

    /// `automate` was called outside a tokio runtime
    #[error("automate must be called from within a tokio runtime")]
    NoRuntime,
}
