//! The canvas WebSocket bridge: translates [`AgentEvent`]s and
//! [`CanvasChange`]s into typed S2C frames, and typed C2S frames into
//! agent turns / canvas mutations (§6 "Canvas WebSocket protocol").

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};

use crate::agent::{AgentEvent, AgentLoop};
use crate::canvas::{CanvasChange, CanvasState, Position};
use crate::router::DefaultSessionTemplate;
use crate::session::{SessionConfig, SessionManager};

/// Shared state behind every `/ws` upgrade.
#[derive(Clone)]
pub struct WsState {
    pub agent: Arc<AgentLoop>,
    pub sessions: Arc<SessionManager>,
    pub canvas: Arc<CanvasState>,
    pub working_directory: PathBuf,
    pub default_session: DefaultSessionTemplate,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

// ─── C2S frames ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum C2SFrame {
    #[serde(rename = "c2s:ping")]
    Ping,
    #[serde(rename = "c2s:drag")]
    Drag { node_id: String, x: f64, y: f64 },
    #[serde(rename = "c2s:message")]
    Message { content: String },
    #[serde(rename = "c2s:click")]
    Click { component_id: String },
    #[serde(rename = "c2s:form_submit")]
    FormSubmit { component_id: String, data: Value },
    #[serde(rename = "c2s:abort")]
    Abort,
}

// ─── S2C frame helpers ────────────────────────────────────────────────────

fn frame(frame_type: &str, body: Value) -> Value {
    let mut map = match body {
        Value::Object(m) => m,
        _ => Default::default(),
    };
    map.insert("type".to_string(), Value::String(frame_type.to_string()));
    Value::Object(map)
}

async fn send_frame(socket: &mut WebSocket, value: &Value) -> bool {
    match serde_json::to_string(value) {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "ws: failed to serialize outgoing frame");
            false
        }
    }
}

fn canvas_change_frame(change: &CanvasChange) -> Value {
    frame("s2c:canvas:change", json!({ "change": change }))
}

fn agent_event_frame(event: &AgentEvent) -> Option<Value> {
    let value = match event {
        AgentEvent::Thinking => frame("s2c:agent:status", json!({ "state": "thinking" })),
        AgentEvent::Text { delta, partial } => {
            frame("s2c:text:delta", json!({ "delta": delta, "partial": partial }))
        }
        AgentEvent::ToolStart { tool, args } => {
            frame("s2c:tool:start", json!({ "tool": tool, "args": args }))
        }
        AgentEvent::ToolProgress { tool, result } => {
            frame("s2c:tool:progress", json!({ "tool": tool, "result": result }))
        }
        AgentEvent::ToolEnd { tool, result, success } => {
            frame("s2c:tool:end", json!({ "tool": tool, "result": result, "success": success }))
        }
        AgentEvent::Complete { answer } => frame("s2c:text:complete", json!({ "answer": answer })),
        AgentEvent::Error { error } => {
            frame("s2c:error", json!({ "code": "AGENT_ERROR", "message": error }))
        }
        AgentEvent::Aborted { reason } => {
            frame("s2c:agent:status", json!({ "state": "aborted", "reason": reason }))
        }
    };
    Some(value)
}

// ─── Socket handler ───────────────────────────────────────────────────────

/// Runs for the lifetime of one WebSocket connection, which owns exactly
/// one [`Session`]. Start subscribes to canvas changes and sends an
/// initial snapshot + idle status; Stop (connection close, or any I/O
/// error) unsubscribes and drops the session's in-flight abort signal.
async fn handle_socket(mut socket: WebSocket, state: WsState) {
    let session_id = {
        let tpl = &state.default_session;
        state.sessions.create_session(SessionConfig {
            channel_id: "canvas-ws".to_string(),
            user_id: "ws-peer".to_string(),
            engine_id: tpl.engine_id.clone(),
            system_prompt: tpl.system_prompt.clone(),
            model: tpl.model.clone(),
            max_context_tokens: tpl.max_context_tokens,
            compaction_strategy: crate::context::CompactionStrategy::drop_oldest(),
        })
    };

    let mut canvas_rx = state.canvas.subscribe();
    {
        let (nodes, edges) = state.canvas.snapshot();
        if !send_frame(&mut socket, &frame("s2c:canvas:snapshot", json!({ "nodes": nodes, "edges": edges }))).await {
            state.sessions.end_session(&session_id);
            return;
        }
        if !send_frame(&mut socket, &frame("s2c:agent:status", json!({ "state": "idle" }))).await {
            state.sessions.end_session(&session_id);
            return;
        }
    }

    // Turn lifecycle: at most one turn in flight per connection. `abort_tx`
    // is replaced each time a turn starts so `c2s:abort` always targets
    // the current one.
    let mut abort_tx: Option<watch::Sender<bool>> = None;
    let mut turn_events: Option<mpsc::UnboundedReceiver<AgentEvent>> = None;

    loop {
        tokio::select! {
            change = canvas_rx.recv() => {
                match change {
                    Ok(change) => {
                        if !send_frame(&mut socket, &canvas_change_frame(&change)).await {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(missed = n, "ws: canvas subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            Some(event) = async {
                match &mut turn_events {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                let is_terminal = matches!(event, AgentEvent::Complete { .. } | AgentEvent::Error { .. } | AgentEvent::Aborted { .. });
                if let Some(f) = agent_event_frame(&event) {
                    if !send_frame(&mut socket, &f).await {
                        break;
                    }
                }
                if is_terminal {
                    turn_events = None;
                    abort_tx = None;
                    if !send_frame(&mut socket, &frame("s2c:agent:status", json!({ "state": "idle" }))).await {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&text, &state, &session_id, &mut socket, &mut abort_tx, &mut turn_events).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "ws: socket read error, closing");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.sessions.end_session(&session_id);
}

async fn handle_client_frame(
    raw: &str,
    state: &WsState,
    session_id: &str,
    socket: &mut WebSocket,
    abort_tx: &mut Option<watch::Sender<bool>>,
    turn_events: &mut Option<mpsc::UnboundedReceiver<AgentEvent>>,
) {
    let parsed: Result<C2SFrame, _> = serde_json::from_str(raw);
    let Ok(c2s) = parsed else {
        send_frame(socket, &frame("s2c:error", json!({ "code": "PARSE_ERROR", "message": "malformed frame" }))).await;
        return;
    };

    match c2s {
        C2SFrame::Ping => {
            send_frame(socket, &frame("s2c:pong", json!({}))).await;
        }
        C2SFrame::Drag { node_id, x, y } => {
            if let Err(e) = state.canvas.move_node(&node_id, Position { x, y }) {
                send_frame(socket, &frame("s2c:error", json!({ "code": "CANVAS_ERROR", "message": e.to_string() }))).await;
            }
        }
        C2SFrame::Abort => {
            if let Some(tx) = abort_tx {
                let _ = tx.send(true);
            }
        }
        C2SFrame::Message { content } => {
            start_turn(state, session_id, content, socket, abort_tx, turn_events).await;
        }
        C2SFrame::Click { component_id } => {
            let content = format!("[USER_CLICK] {component_id}");
            start_turn(state, session_id, content, socket, abort_tx, turn_events).await;
        }
        C2SFrame::FormSubmit { component_id, data } => {
            let content = format!("[FORM_SUBMIT] {component_id}: {data}");
            start_turn(state, session_id, content, socket, abort_tx, turn_events).await;
        }
    }
}

/// Starts an agent turn for this connection's session, if one isn't
/// already in flight. The turn runs on a spawned task; its event stream
/// is wired into `turn_events` so the select loop above forwards frames.
async fn start_turn(
    state: &WsState,
    session_id: &str,
    content: String,
    socket: &mut WebSocket,
    abort_tx: &mut Option<watch::Sender<bool>>,
    turn_events: &mut Option<mpsc::UnboundedReceiver<AgentEvent>>,
) {
    if turn_events.is_some() {
        send_frame(socket, &frame("s2c:error", json!({ "code": "TURN_IN_PROGRESS", "message": "a turn is already running" }))).await;
        return;
    }

    let Some(mut session) = state.sessions.take_session(session_id) else {
        send_frame(socket, &frame("s2c:error", json!({ "code": "NO_SESSION", "message": "session not found" }))).await;
        return;
    };

    send_frame(socket, &frame("s2c:agent:status", json!({ "state": "thinking" }))).await;

    let (tx, rx) = mpsc::unbounded_channel();
    let (watch_tx, watch_rx) = watch::channel(false);
    *abort_tx = Some(watch_tx);
    *turn_events = Some(rx);

    let agent = Arc::clone(&state.agent);
    let sessions = Arc::clone(&state.sessions);
    let working_directory = state.working_directory.clone();
    tokio::spawn(async move {
        let result = agent.run_turn(&mut session, content, working_directory, tx, watch_rx).await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "ws: agent turn failed");
        }
        sessions.put_session(session);
    });
}
