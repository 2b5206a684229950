//! `AgentLoop` — the core reasoning loop.
//!
//! # Algorithm
//!
//! ```text
//! append user message to session context
//! onBeforeFirstRun: inject recalled memory (first turn of the session only)
//! emit `thinking` once, before the loop
//! loop (bounded by max_iterations):
//!   abort signal set?        → emit `aborted`, return
//!   engine.stream(context)   → on error: jittered backoff, retry same
//!                              iteration up to max_retries, else `error`
//!   relay each chunk as `text_delta` (delta + accumulated partial),
//!                              stop at the final chunk
//!   no tool calls?           → append assistant message
//!                              → optional verifier gate (may re-enter loop)
//!                              → emit `complete`, return
//!   tool calls present       → for each call, in order:
//!       validate args as untrusted input (SafetyPolicy)
//!       look up tool, run its own `validate`
//!       emit `tool_start` → execute → emit `tool_end` (output sanitized)
//!   drain steering queue → append as user messages
//!   iteration += 1
//! iteration limit reached without completion → emit `error` (IterationLimit)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::{
    ai::{
        provider::LLMProvider,
        types::{CompletionRequest, Message as WireMessage, MessageRole as WireRole},
    },
    context::{Message, MessageRole},
    error::CoreError,
    event_bus::{AppEvent, EventBus},
    memory::traits::{Memory, MemoryCategory},
    security::{SafetyPolicy, ValidationResult},
    session::Session,
    tools::{ToolContext, ToolRegistry},
};

use super::events::AgentEvent;
use super::tool_parser::{ParsedToolCall, parse_tool_calls};
use super::verification::{TurnVerifier, VerificationContext, VerificationVerdict};

// ─── AgentLoopConfig ────────────────────────────────────────────────────────

/// Runtime configuration for an [`AgentLoop`].
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    /// Sampling temperature (0.0-2.0). `None` uses the provider default.
    pub temperature: Option<f32>,
    /// Maximum tokens per response. `None` uses the provider default.
    pub max_tokens: Option<u32>,
    /// Maximum engine turns in a single call to [`AgentLoop::run_turn`].
    pub max_iterations: usize,
    /// Maximum consecutive retries on a transient engine failure.
    pub max_retries: usize,
    /// Base delay for the retry backoff.
    pub backoff_base: Duration,
    /// Ceiling for the retry backoff, before jitter.
    pub backoff_max: Duration,
    /// Number of recalled memories injected as context ahead of the first
    /// turn of a session.
    pub memory_recall_limit: usize,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            max_tokens: Some(4096),
            max_iterations: 30,
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
            memory_recall_limit: 5,
        }
    }
}

// ─── AgentLoop ──────────────────────────────────────────────────────────────

/// The reasoning loop. Stateless across calls — all conversation state
/// lives on the [`Session`] passed to [`run_turn`](AgentLoop::run_turn).
pub struct AgentLoop {
    provider: Arc<dyn LLMProvider>,
    tool_registry: Arc<ToolRegistry>,
    safety_policy: Arc<dyn SafetyPolicy>,
    bus: Option<Arc<dyn EventBus>>,
    memory: Option<Arc<dyn Memory>>,
    verifier: Option<Arc<dyn TurnVerifier>>,
    config: AgentLoopConfig,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tool_registry: Arc<ToolRegistry>,
        safety_policy: Arc<dyn SafetyPolicy>,
        config: AgentLoopConfig,
    ) -> Self {
        Self {
            provider,
            tool_registry,
            safety_policy,
            bus: None,
            memory: None,
            verifier: None,
            config,
        }
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn TurnVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    // ── Entry point ─────────────────────────────────────────────────────

    /// Run one user turn to completion, streaming [`AgentEvent`]s to
    /// `events` as the turn progresses. Mutates `session` in place:
    /// context, counters, and steering queue reflect everything that
    /// happened. Returns the final answer text.
    #[tracing::instrument(
        name = "agent.run_turn",
        skip_all,
        fields(session_id = %session.session_id, model = %session.model)
    )]
    pub async fn run_turn(
        &self,
        session: &mut Session,
        user_message: impl Into<String>,
        working_directory: PathBuf,
        events: mpsc::UnboundedSender<AgentEvent>,
        abort: watch::Receiver<bool>,
    ) -> Result<String, CoreError> {
        let user_message = user_message.into();
        let is_first_turn = session.counters.loop_iterations == 0;

        if is_first_turn {
            self.inject_memory(session, &user_message).await;
        }

        session.context.add_message(Message::user(user_message.clone())).await;

        let mut iteration = 0usize;
        let mut retries = 0usize;
        let mut verification_retries = 0usize;
        let mut tool_errors = 0usize;
        let mut state_snapshots: Vec<crate::agent::verification::ToolStateSnapshot> = Vec::new();

        let _ = events.send(AgentEvent::Thinking);

        loop {
            if *abort.borrow() {
                let reason = "abort signal received".to_string();
                let _ = events.send(AgentEvent::Aborted { reason: reason.clone() });
                return Err(CoreError::Aborted(reason));
            }

            if iteration >= self.config.max_iterations {
                let _ = events.send(AgentEvent::Error { error: "iteration limit reached".into() });
                session.fail("iteration limit reached");
                return Err(CoreError::IterationLimit(iteration));
            }

            let wire_messages = to_wire_messages(&session.context.get_messages());
            let mut request = CompletionRequest::new(session.model.clone(), wire_messages);
            if let Some(t) = self.config.temperature {
                request = request.with_temperature(t);
            }
            if let Some(m) = self.config.max_tokens {
                request = request.with_max_tokens(m);
            }

            session.counters.loop_iterations += 1;
            session.counters.llm_calls += 1;

            let mut stream = match self.provider.stream(request).await {
                Ok(s) => {
                    retries = 0;
                    s
                }
                Err(e) => {
                    retries += 1;
                    if retries > self.config.max_retries {
                        let _ = events.send(AgentEvent::Error { error: e.clone() });
                        session.fail(e.clone());
                        return Err(CoreError::Provider(e));
                    }
                    let delay = jittered_backoff(retries, self.config.backoff_base, self.config.backoff_max);
                    if !wait_or_abort(delay, &abort).await {
                        let reason = "abort signal received during retry backoff".to_string();
                        let _ = events.send(AgentEvent::Aborted { reason: reason.clone() });
                        return Err(CoreError::Aborted(reason));
                    }
                    continue;
                }
            };

            let mut content = String::new();
            let mut stream_error = None;
            while let Some(chunk_result) = stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        content.push_str(&chunk.delta);
                        if !chunk.delta.is_empty() {
                            let _ = events.send(AgentEvent::Text { delta: chunk.delta, partial: content.clone() });
                        }
                        if chunk.is_final {
                            break;
                        }
                    }
                    Err(e) => {
                        stream_error = Some(e);
                        break;
                    }
                }
            }
            drop(stream);

            if let Some(e) = stream_error {
                retries += 1;
                if retries > self.config.max_retries {
                    let _ = events.send(AgentEvent::Error { error: e.clone() });
                    session.fail(e.clone());
                    return Err(CoreError::Provider(e));
                }
                let delay = jittered_backoff(retries, self.config.backoff_base, self.config.backoff_max);
                if !wait_or_abort(delay, &abort).await {
                    let reason = "abort signal received during retry backoff".to_string();
                    let _ = events.send(AgentEvent::Aborted { reason: reason.clone() });
                    return Err(CoreError::Aborted(reason));
                }
                continue;
            }

            let tool_calls = parse_tool_calls(&content);

            if tool_calls.is_empty() {
                session.context.add_message(Message::assistant(content.clone())).await;

                if let Some(verifier) = self.verifier.clone() {
                    let outcome = verifier
                        .verify(VerificationContext {
                            task: &user_message,
                            answer: &content,
                            tool_calls_made: session.counters.tool_invocations as usize,
                            tool_errors,
                            state_snapshots: &state_snapshots,
                        })
                        .await;

                    if outcome.verdict == VerificationVerdict::Failure
                        && verification_retries < self.config.max_retries
                    {
                        verification_retries += 1;
                        session
                            .context
                            .add_message(Message::user(format!(
                                "[Verification failed, confidence {:.2}] {}",
                                outcome.confidence, outcome.reasoning
                            )))
                            .await;
                        iteration += 1;
                        continue;
                    }
                }

                let _ = events.send(AgentEvent::Complete { answer: content.clone() });
                session.complete();
                self.store_session_summary(&user_message, &content).await;
                return Ok(content);
            }

            let tool_call_records = tool_calls
                .iter()
                .enumerate()
                .map(|(i, c)| crate::context::ToolCallRecord {
                    id: c.call_id.clone().unwrap_or_else(|| format!("call_{i}")),
                    name: c.name.clone(),
                    arguments: c.arguments.clone(),
                })
                .collect();
            session
                .context
                .add_message(Message::assistant_with_tool_calls(content.clone(), tool_call_records))
                .await;

            for call in &tool_calls {
                session.counters.tool_invocations += 1;
                let id = call.call_id.clone().unwrap_or_else(|| call.name.clone());
                let (result, success, snapshot) = self
                    .execute_tool_call(session, call, &working_directory, &events, abort.clone())
                    .await;
                if !success {
                    tool_errors += 1;
                }
                if let Some(snapshot) = snapshot {
                    state_snapshots.push(snapshot);
                }
                session.context.add_message(Message::tool_result(id, result)).await;
            }

            for steered in session.drain_steering() {
                session.context.add_message(Message::user(steered)).await;
            }

            iteration += 1;
        }
    }

    // ── Internal ─────────────────────────────────────────────────────────

    async fn inject_memory(&self, session: &mut Session, user_message: &str) {
        let Some(mem) = &self.memory else { return };
        let Ok(entries) = mem.recall(user_message, self.config.memory_recall_limit).await else {
            return;
        };
        if entries.is_empty() {
            return;
        }
        let context = entries
            .iter()
            .map(|e| format!("- {}: {}", e.key, e.content))
            .collect::<Vec<_>>()
            .join("\n");
        session
            .context
            .add_message(Message::system(format!("Relevant context from memory:\n{context}")))
            .await;
        if let Some(bus) = &self.bus {
            let _ = bus.publish(AppEvent::MemoryRecalled {
                query: user_message.to_string(),
                count: entries.len(),
            });
        }
    }

    async fn store_session_summary(&self, user_message: &str, answer: &str) {
        let Some(mem) = &self.memory else { return };
        let summary = if answer.len() > 200 {
            format!("{}…", &answer[..200])
        } else {
            answer.to_string()
        };
        let key = format!("session:{}", chrono::Utc::now().format("%Y%m%dT%H%M%S"));
        let _ = mem
            .store(&key, &format!("User: {user_message}\nAgent: {summary}"), MemoryCategory::Conversation)
            .await;
    }

    #[tracing::instrument(name = "agent.tool", skip_all, fields(tool = %call.name))]
    async fn execute_tool_call(
        &self,
        session: &Session,
        call: &ParsedToolCall,
        working_directory: &PathBuf,
        events: &mpsc::UnboundedSender<AgentEvent>,
        abort: watch::Receiver<bool>,
    ) -> (String, bool, Option<crate::agent::verification::ToolStateSnapshot>) {
        // Untrusted-input check on the raw arguments before they reach any tool.
        if let Err(e) = self.safety_policy.validate_input(&call.arguments.to_string()) {
            let msg = format!("input rejected: {e}");
            self.safety_policy.audit(
                &call.name,
                call.arguments.clone(),
                crate::security::RiskLevel::High,
                "denied",
                Some(&msg),
            );
            let _ = events.send(AgentEvent::ToolEnd { tool: call.name.clone(), result: msg.clone(), success: false });
            return (msg, false, None);
        }

        match self.safety_policy.validate_command(&call.name) {
            ValidationResult::Denied(reason) => {
                self.safety_policy.audit(
                    &call.name,
                    call.arguments.clone(),
                    crate::security::RiskLevel::Medium,
                    "denied",
                    Some(&reason),
                );
                let msg = format!("denied by safety policy: {reason}");
                let _ = events.send(AgentEvent::ToolEnd { tool: call.name.clone(), result: msg.clone(), success: false });
                return (msg, false, None);
            }
            ValidationResult::NeedsApproval => {
                if !self.await_approval(call).await {
                    let msg = "denied by user (or approval timed out)".to_string();
                    self.safety_policy.audit(
                        &call.name,
                        call.arguments.clone(),
                        crate::security::RiskLevel::Medium,
                        "denied",
                        Some(&msg),
                    );
                    let _ = events.send(AgentEvent::ToolEnd { tool: call.name.clone(), result: msg.clone(), success: false });
                    return (msg, false, None);
                }
            }
            ValidationResult::Allowed => {}
        }

        let Some(tool) = self.tool_registry.get(&call.name) else {
            let msg = format!("tool '{}' is not registered", call.name);
            let _ = events.send(AgentEvent::ToolEnd { tool: call.name.clone(), result: msg.clone(), success: false });
            return (msg, false, None);
        };

        if let ValidationResult::Denied(reason) = tool.validate(&call.arguments) {
            let msg = format!("rejected by tool: {reason}");
            let _ = events.send(AgentEvent::ToolEnd { tool: call.name.clone(), result: msg.clone(), success: false });
            return (msg, false, None);
        }

        let _ = events.send(AgentEvent::ToolStart { tool: call.name.clone(), args: call.arguments.clone() });
        if let Some(bus) = &self.bus {
            let _ = bus.publish(AppEvent::AgentToolStart { tool_name: call.name.clone(), args: call.arguments.clone() });
        }

        let progress_events = events.clone();
        let progress_name = call.name.clone();
        let ctx = ToolContext::new(session.session_id.clone(), working_directory.clone(), self.safety_policy.clone(), abort)
            .with_progress(Arc::new(move |msg: String| {
                let _ = progress_events.send(AgentEvent::ToolProgress { tool: progress_name.clone(), result: msg });
            }));

        let before_snapshot = tool.get_state_snapshot();
        let (output, success) = match tool.execute(call.arguments.clone(), &ctx).await {
            Ok(tr) => (tr.output, tr.success),
            Err(e) => (e, false),
        };
        let after_snapshot = tool.get_state_snapshot();
        let snapshot = (before_snapshot.is_some() || after_snapshot.is_some()).then(|| {
            crate::agent::verification::ToolStateSnapshot {
                tool: call.name.clone(),
                before: before_snapshot,
                after: after_snapshot,
            }
        });

        let sanitized = self.safety_policy.sanitize_output(&output).text;

        self.safety_policy.audit(
            &call.name,
            call.arguments.clone(),
            crate::security::RiskLevel::Low,
            if success { "allowed" } else { "failed" },
            Some(&sanitized),
        );
        if let Some(bus) = &self.bus {
            let _ = bus.publish(AppEvent::AgentToolResult { tool_name: call.name.clone(), result: sanitized.clone(), success });
        }
        let _ = events.send(AgentEvent::ToolEnd { tool: call.name.clone(), result: sanitized.clone(), success });

        (sanitized, success, snapshot)
    }

    /// Publish `ApprovalNeeded` and wait up to 30s for a matching
    /// `ApprovalResponse`. Denies conservatively with no bus or on timeout.
    async fn await_approval(&self, call: &ParsedToolCall) -> bool {
        let Some(bus) = &self.bus else { return false };
        let action_id = uuid::Uuid::new_v4().to_string();
        let _ = bus.publish(AppEvent::ApprovalNeeded {
            action_id: action_id.clone(),
            tool_name: call.name.clone(),
            description: format!("Agent wants to run tool '{}'", call.name),
            risk_level: "medium".to_string(),
        });

        let mut rx = bus.subscribe();
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                match rx.recv().await {
                    Ok(AppEvent::ApprovalResponse { action_id: aid, approved }) if aid == action_id => break approved,
                    Ok(_) => continue,
                    Err(_) => break false,
                }
            }
        })
        .await
        .unwrap_or(false)
    }
}

/// Sleeps for `delay`, waking early (and returning `false`) if the abort
/// signal fires first. Returns `true` if the sleep completed normally.
async fn wait_or_abort(delay: Duration, abort: &watch::Receiver<bool>) -> bool {
    let mut abort = abort.clone();
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = abort.changed() => !*abort.borrow(),
    }
}

/// `delay = min(base * 2^attempt, max) + U(0, 0.1 * delay)`.
fn jittered_backoff(attempt: usize, base: Duration, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt.min(20) as u32).unwrap_or(u32::MAX);
    let capped = base.saturating_mul(factor).min(max);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let jitter_fraction = (nanos % 1000) as f64 / 1000.0 * 0.1;
    capped.mul_f64(1.0 + jitter_fraction)
}

/// Flattens the context's rich [`Message`] log into the provider's flat
/// wire format. Tool-role messages (no native tool role on the wire) are
/// carried as user messages, matching the convention the model itself
/// produced them under (inline `<tool_call>` tags in assistant text).
fn to_wire_messages(messages: &[Message]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                MessageRole::System => WireRole::System,
                MessageRole::User | MessageRole::Tool => WireRole::User,
                MessageRole::Assistant => WireRole::Assistant,
            };
            WireMessage { role, content: m.content.as_text() }
        })
        .collect()
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ai::{
            provider::StreamResponse,
            types::{CompletionResponse, StreamChunk},
        },
        context::CompactionStrategy,
        security::{AutonomyLevel, DefaultSafetyPolicy, SecurityPolicy},
        session::{SessionConfig, SessionState},
        tools::{Tool, ToolResult},
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProvider {
        responses: Vec<String>,
        index: AtomicUsize,
    }

    impl MockProvider {
        fn new(responses: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                responses: responses.into_iter().map(str::to_string).collect(),
                index: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for MockProvider {
        async fn complete(&self, _request: CompletionRequest) -> crate::ai::provider::Result<CompletionResponse> {
            let i = self.index.fetch_add(1, Ordering::SeqCst);
            let content = self.responses.get(i).cloned().unwrap_or_else(|| "No more responses".to_string());
            Ok(CompletionResponse { content, model: "mock".to_string(), usage: None, finish_reason: Some("stop".into()) })
        }

        async fn stream(&self, _r: CompletionRequest) -> crate::ai::provider::Result<StreamResponse> {
            let i = self.index.fetch_add(1, Ordering::SeqCst);
            let content = self.responses.get(i).cloned().unwrap_or_else(|| "No more responses".to_string());
            let chunk = StreamChunk { delta: content, is_final: true, finish_reason: Some("stop".into()) };
            Ok(Box::pin(futures::stream::iter(vec![Ok(chunk)])))
        }

        fn context_limit(&self) -> usize {
            128_000
        }
        fn supports_tools(&self) -> bool {
            false
        }
        fn provider_name(&self) -> &str {
            "mock"
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, String> {
            let msg = args.get("message").and_then(|v| v.as_str()).unwrap_or("(empty)").to_string();
            Ok(ToolResult::ok(msg))
        }
    }

    fn registry_with_echo() -> Arc<ToolRegistry> {
        let mut r = ToolRegistry::new();
        r.register(Arc::new(EchoTool) as Arc<dyn Tool>);
        Arc::new(r)
    }

    fn supervised_policy() -> Arc<dyn SafetyPolicy> {
        Arc::new(DefaultSafetyPolicy::new(SecurityPolicy::default_policy()))
    }

    fn readonly_policy() -> Arc<dyn SafetyPolicy> {
        Arc::new(DefaultSafetyPolicy::new(SecurityPolicy::new(AutonomyLevel::ReadOnly, None, vec![], 3600, 20)))
    }

    fn new_session() -> Session {
        Session::new(SessionConfig {
            channel_id: "test".into(),
            user_id: "u1".into(),
            engine_id: "default".into(),
            system_prompt: "You are a helper.".into(),
            model: "mock".into(),
            max_context_tokens: 8000,
            compaction_strategy: CompactionStrategy::drop_oldest(),
        })
    }

    async fn run(loop_: &AgentLoop, session: &mut Session, msg: &str) -> Result<String, CoreError> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (_abort_tx, abort_rx) = watch::channel(false);
        loop_.run_turn(session, msg, PathBuf::from("/tmp"), tx, abort_rx).await
    }

    #[tokio::test]
    async fn single_turn_no_tool_calls() {
        let loop_ = AgentLoop::new(
            MockProvider::new(vec!["Hello, I can help with that."]),
            registry_with_echo(),
            supervised_policy(),
            AgentLoopConfig::default(),
        );
        let mut session = new_session();
        let result = run(&loop_, &mut session, "What is 2+2?").await.unwrap();
        assert_eq!(result, "Hello, I can help with that.");
        assert_eq!(session.state, SessionState::Completed);
    }

    #[tokio::test]
    async fn tool_call_executes_and_continues() {
        let loop_ = AgentLoop::new(
            MockProvider::new(vec![
                r#"<tool_call>{"name": "echo", "arguments": {"message": "ping"}}</tool_call>"#,
                "The echo said: ping. That's the result.",
            ]),
            registry_with_echo(),
            supervised_policy(),
            AgentLoopConfig::default(),
        );
        let mut session = new_session();
        let result = run(&loop_, &mut session, "Test the echo tool.").await.unwrap();
        assert_eq!(result, "The echo said: ping. That's the result.");
        assert_eq!(session.counters.tool_invocations, 1);
    }

    #[tokio::test]
    async fn unknown_tool_injected_as_error_and_continues() {
        let loop_ = AgentLoop::new(
            MockProvider::new(vec![
                r#"<tool_call>{"name": "nonexistent_tool", "arguments": {}}</tool_call>"#,
                "I couldn't find that tool, sorry.",
            ]),
            registry_with_echo(),
            supervised_policy(),
            AgentLoopConfig::default(),
        );
        let mut session = new_session();
        let result = run(&loop_, &mut session, "user").await.unwrap();
        assert_eq!(result, "I couldn't find that tool, sorry.");
    }

    #[tokio::test]
    async fn max_iterations_emits_iteration_limit_error() {
        let responses: Vec<&str> = (0..40)
            .map(|_| r#"<tool_call>{"name":"echo","arguments":{"message":"loop"}}</tool_call>"#)
            .collect();
        let config = AgentLoopConfig { max_iterations: 3, ..Default::default() };
        let loop_ = AgentLoop::new(MockProvider::new(responses), registry_with_echo(), supervised_policy(), config);
        let mut session = new_session();
        let result = run(&loop_, &mut session, "user").await;
        assert!(matches!(result, Err(CoreError::IterationLimit(_))));
        assert_eq!(session.state, SessionState::Failed);
    }

    #[tokio::test]
    async fn readonly_policy_denies_risky_tool_call() {
        let loop_ = AgentLoop::new(
            MockProvider::new(vec![
                r#"<tool_call>{"name": "rm", "arguments": {}}</tool_call>"#,
                "The tool was denied, I'll work another way.",
            ]),
            registry_with_echo(),
            readonly_policy(),
            AgentLoopConfig::default(),
        );
        let mut session = new_session();
        let result = run(&loop_, &mut session, "delete a file").await.unwrap();
        assert_eq!(result, "The tool was denied, I'll work another way.");
    }

    #[tokio::test]
    async fn abort_signal_stops_the_loop() {
        let loop_ = AgentLoop::new(
            MockProvider::new(vec!["irrelevant"]),
            registry_with_echo(),
            supervised_policy(),
            AgentLoopConfig::default(),
        );
        let mut session = new_session();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (_abort_tx, abort_rx) = watch::channel(true);
        let result = loop_.run_turn(&mut session, "hi", PathBuf::from("/tmp"), tx, abort_rx).await;
        assert!(matches!(result, Err(CoreError::Aborted(_))));
    }

    #[tokio::test]
    async fn steering_queue_drains_into_context_after_tool_round() {
        let loop_ = AgentLoop::new(
            MockProvider::new(vec![
                r#"<tool_call>{"name": "echo", "arguments": {"message": "hi"}}</tool_call>"#,
                "Done with the steering message in view.",
            ]),
            registry_with_echo(),
            supervised_policy(),
            AgentLoopConfig::default(),
        );
        let mut session = new_session();
        session.push_steering("by the way, also check the weather");
        let result = run(&loop_, &mut session, "use the echo tool").await.unwrap();
        assert_eq!(result, "Done with the steering message in view.");
        let messages = session.context.get_messages();
        assert!(messages.iter().any(|m| m.content.as_text().contains("also check the weather")));
    }
}
