//! Crate-level error taxonomy.
//!
//! Individual modules define their own `thiserror` enums for the errors
//! they can produce; [`CoreError`] unifies them at boundaries that must
//! return a single error type, mirroring the error kinds named in the
//! orchestration design (`Validation`, `Security`, `Provider`, `Tool`,
//! `Channel`, `Timeout`/`Aborted`, `IterationLimit`, `Fatal`).

use thiserror::Error;

use crate::security::SecurityError;

/// Unified error type for the agent orchestration core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Tool argument or schema validation failed; the loop continues with
    /// a synthetic failed tool result.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A safety-policy violation.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// The model provider failed after exhausting retries.
    #[error("provider error: {0}")]
    Provider(String),

    /// A tool execution failed.
    #[error("tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    /// A channel send/edit failed.
    #[error("channel error: {0}")]
    Channel(String),

    /// Cooperative cancellation occurred.
    #[error("aborted: {0}")]
    Aborted(String),

    /// The agent loop exhausted its iteration budget without completing.
    #[error("iteration limit reached after {0} iterations")]
    IterationLimit(usize),

    /// An invariant was breached; the owning session moves to `failed`.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CoreError {
    /// Returns true for errors the loop can recover from locally without
    /// surfacing a terminal event (validation, transient provider/channel
    /// failures before retries are exhausted).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoreError::Validation(_) | CoreError::Channel(_))
    }
}
