//! The typed seam between the agent loop and an optional post-answer
//! verifier. The loop only depends on this trait; the format-check +
//! semantic-check implementation lives in its own module and is wired in
//! via [`AgentLoop::with_verifier`].

use async_trait::async_trait;

/// A tool's opaque state snapshot captured immediately before and after
/// one invocation, fed to the format phase's state-consistency rule.
/// `None` on either side means the tool doesn't implement
/// `Tool::get_state_snapshot`.
#[derive(Debug, Clone)]
pub struct ToolStateSnapshot {
    pub tool: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

/// Everything a verifier needs to judge one finished turn.
pub struct VerificationContext<'a> {
    pub task: &'a str,
    pub answer: &'a str,
    pub tool_calls_made: usize,
    pub tool_errors: usize,
    pub state_snapshots: &'a [ToolStateSnapshot],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationVerdict {
    Success,
    Partial,
    Failure,
}

#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub verdict: VerificationVerdict,
    /// 0.0-1.0.
    pub confidence: f32,
    pub reasoning: String,
}

#[async_trait]
pub trait TurnVerifier: Send + Sync {
    async fn verify(&self, ctx: VerificationContext<'_>) -> VerificationOutcome;
}
