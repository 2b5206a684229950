//! Safety policy: filesystem scope, command/input validation, and output
//! sanitization.

pub mod input_validator;
pub mod output_sanitizer;
pub mod policy;

pub use input_validator::{
    normalize_text, validate_input, EscalationTracker, InjectionCategory, InputFinding, Severity,
};
pub use output_sanitizer::{sanitize_output, SanitizeOutcome};
pub use policy::{
    AuditEntry, AutonomyLevel, DefaultSafetyPolicy, FsOp, RiskLevel, SafetyPolicy, SecurityPolicy,
    ValidationResult,
};

use thiserror::Error;

/// Distinguished error kind any safety-policy violation surfaces as; the
/// agent loop turns this into an `error` event for the current iteration
/// and a failed tool result for the current call.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("path rejected: {0}")]
    PathRejected(String),

    #[error("command rejected: {0}")]
    CommandRejected(String),

    #[error("input rejected ({category}): pattern '{pattern}' matched")]
    InputRejected { category: String, pattern: String },

    #[error("confirmation required: {0}")]
    ConfirmationRequired(String),
}
