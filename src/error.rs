//! Errors surfaced through array construction.

use thiserror::Error;

/// Failure of a value producer during literal execution.
///
/// This is the only recoverable failure the engine ever sees: type
/// mismatches cause specialisation transitions, never errors. A producer
/// failure propagates out of `execute` unchanged and leaves the site's
/// current specialisation as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("value producer failed: {reason}")]
pub struct EvalError {
    /// The host runtime's failure description.
    pub reason: String,
}

impl EvalError {
    /// Creates an error carrying the host runtime's failure description.
    pub fn new(reason: impl Into<String>) -> Self {
        EvalError { reason: reason.into() }
    }
}
