use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::security::{SafetyPolicy, ValidationResult};

/// The result of executing a [`Tool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Human-readable output (stdout, file contents, directory listing, etc.).
    pub output: String,
    /// Whether the tool considered the execution successful.
    pub success: bool,
    /// Optional structured metadata for machine consumption.
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
            metadata: None,
        }
    }

    pub fn err(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Relative cost class a tool reports, used by callers to schedule or
/// throttle concurrent invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolWeight {
    Lightweight,
    Heavyweight,
}

/// Callback a tool uses to report incremental progress while running.
pub type ProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Per-invocation context passed to [`Tool::execute`]: the owning
/// session, a confined working directory, the session's safety policy,
/// a cooperative abort signal, an optional progress-emit callback, and
/// named extensions (canvas state, search key, signer callback, etc.)
/// tools can downcast out of.
pub struct ToolContext {
    pub session_id: String,
    pub working_directory: PathBuf,
    pub safety_policy: Arc<dyn SafetyPolicy>,
    abort: tokio::sync::watch::Receiver<bool>,
    pub progress: Option<ProgressCallback>,
    pub extensions: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ToolContext {
    pub fn new(
        session_id: impl Into<String>,
        working_directory: PathBuf,
        safety_policy: Arc<dyn SafetyPolicy>,
        abort: tokio::sync::watch::Receiver<bool>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            working_directory,
            safety_policy,
            abort,
            progress: None,
            extensions: HashMap::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: Arc<dyn Any + Send + Sync>) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    pub fn is_aborted(&self) -> bool {
        *self.abort.borrow()
    }

    pub fn emit_progress(&self, message: impl Into<String>) {
        if let Some(cb) = &self.progress {
            cb(message.into());
        }
    }

    pub fn extension<T: 'static + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.extensions.get(key)?.clone().downcast::<T>().ok()
    }
}

/// A capability that the agent loop can invoke.
///
/// Implementations must be `Send + Sync` so they can be held in a shared
/// `Arc<dyn Tool>` registry.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable machine identifier (snake_case), e.g. `"shell"`.
    fn name(&self) -> &str;

    /// Human-readable description used in LLM `tool_use` payloads.
    fn description(&self) -> &str;

    /// JSON Schema object describing the tool's accepted parameters.
    fn parameters_schema(&self) -> Value;

    /// Relative execution cost; defaults to lightweight.
    fn weight(&self) -> ToolWeight {
        ToolWeight::Lightweight
    }

    /// Validate `args` ahead of execution (schema shape, safety-policy
    /// checks on any embedded paths/commands). Defaults to `Allowed`.
    fn validate(&self, _args: &Value) -> ValidationResult {
        ValidationResult::Allowed
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, String>;

    /// Opaque resumable state for long-running tools; `None` if the tool
    /// has none.
    fn get_state_snapshot(&self) -> Option<Value> {
        None
    }

    /// Cooperative cancellation hook for long-running tools. Default is
    /// a no-op; `ToolContext::is_aborted` is the primary signal.
    async fn abort(&self, _reason: &str) {}
}

/// Summary of a registered tool, suitable for inclusion in LLM API requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub schema: Value,
}
