//! The reasoning loop: session-aware, tool-using, steering-responsive.
//!
//! # Key types
//! - [`AgentLoop`] — drives the per-turn iteration cycle against a [`crate::session::Session`]
//! - [`AgentLoopConfig`] — iteration/retry/backoff parameters
//! - [`AgentEvent`] — the lazy output event stream a turn emits
//! - [`ParsedToolCall`] — a tool invocation extracted from an LLM response
//! - [`TurnVerifier`] — the optional post-answer verification seam

pub mod events;
pub mod loop_;
pub mod tool_parser;
pub mod verification;

pub use events::AgentEvent;
pub use loop_::{AgentLoop, AgentLoopConfig};
pub use tool_parser::ParsedToolCall;
pub use verification::{TurnVerifier, VerificationContext, VerificationOutcome, VerificationVerdict, ToolStateSnapshot};
