//! The agent loop's lazy output event grammar.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event in an agent turn's output stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Thinking,
    Text {
        delta: String,
        partial: String,
    },
    ToolStart {
        tool: String,
        args: Value,
    },
    ToolProgress {
        tool: String,
        result: String,
    },
    ToolEnd {
        tool: String,
        result: String,
        success: bool,
    },
    Complete {
        answer: String,
    },
    Error {
        error: String,
    },
    Aborted {
        reason: String,
    },
}
