//! Chat-app streaming bridge: drains an agent turn's [`AgentEvent`] stream
//! and mirrors it to a [`Channel`] peer, either by editing one message in
//! place as text accumulates or by resending word-boundary-split chunks
//! when the channel can't edit (§4.4 "Channel (chat-app) bridge").

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedReceiver;

use crate::agent::events::AgentEvent;
use crate::channels::Channel;

/// Minimum spacing between successive edits of the same message, so a
/// fast-streaming turn doesn't hammer the channel's rate limits.
pub const DEFAULT_MIN_EDIT_INTERVAL: Duration = Duration::from_secs(1);

pub struct ChannelBridge {
    channel: Arc<dyn Channel>,
    recipient: Option<String>,
    min_edit_interval: Duration,
}

/// Outcome of draining one agent turn through the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeOutcome {
    Completed { answer: String },
    Errored { error: String },
    Aborted { reason: String },
}

impl ChannelBridge {
    pub fn new(channel: Arc<dyn Channel>, recipient: Option<String>) -> Self {
        Self { channel, recipient, min_edit_interval: DEFAULT_MIN_EDIT_INTERVAL }
    }

    pub fn with_min_edit_interval(mut self, interval: Duration) -> Self {
        self.min_edit_interval = interval;
        self
    }

    /// Split `text` into chunks no longer than `limit`, preferring to break
    /// on the last whitespace boundary within the limit rather than mid-word.
    fn split_into_chunks(text: &str, limit: usize) -> Vec<String> {
        if text.len() <= limit {
            return vec![text.to_string()];
        }
        let mut chunks = Vec::new();
        let mut remaining = text;
        while remaining.len() > limit {
            let window = &remaining[..limit];
            let split_at = window.rfind(char::is_whitespace).unwrap_or(limit);
            let (head, tail) = remaining.split_at(split_at.max(1));
            chunks.push(head.trim_end().to_string());
            remaining = tail.trim_start();
        }
        if !remaining.is_empty() {
            chunks.push(remaining.to_string());
        }
        chunks
    }

    /// Sends `text`, splitting it into channel-size chunks if the channel
    /// imposes a `max_message_len`. Used for the resend fallback path.
    async fn send_chunked(&self, text: &str) -> Result<(), String> {
        let chunks = match self.channel.max_message_len() {
            Some(limit) if limit > 0 => Self::split_into_chunks(text, limit),
            _ => vec![text.to_string()],
        };
        for chunk in chunks {
            self.channel.send(&chunk, self.recipient.as_deref()).await?;
        }
        Ok(())
    }

    /// Drains `events` (the per-turn stream from [`crate::agent::AgentLoop::run_turn`])
    /// and mirrors progress to the channel. Send/edit failures are logged
    /// but never stop the underlying agent turn — the caller already owns
    /// that task.
    pub async fn run(&self, mut events: UnboundedReceiver<AgentEvent>) -> BridgeOutcome {
        let mut accumulated = String::new();
        let mut tracked_message_id: Option<String> = None;
        let mut last_edit_at: Option<Instant> = None;
        let edit_capable = self.channel.supports_edit();

        while let Some(event) = events.recv().await {
            match event {
                AgentEvent::Thinking | AgentEvent::ToolStart { .. } | AgentEvent::ToolProgress { .. } => {
                    // No chat-visible effect; the canvas bridge surfaces these instead.
                }
                AgentEvent::ToolEnd { .. } => {}
                AgentEvent::Text { partial, .. } => {
                    accumulated = partial;
                    if !edit_capable {
                        continue;
                    }
                    let due = last_edit_at.is_none_or(|t| t.elapsed() >= self.min_edit_interval);
                    if !due {
                        continue;
                    }
                    match &tracked_message_id {
                        Some(id) => {
                            if let Err(e) = self.channel.edit_message(id, &accumulated).await {
                                tracing::warn!(error = %e, "channel_bridge: edit failed");
                            }
                        }
                        None => match self.channel.send_trackable(&accumulated, self.recipient.as_deref()).await {
                            Ok(id) => tracked_message_id = id,
                            Err(e) => tracing::warn!(error = %e, "channel_bridge: initial send failed"),
                        },
                    }
                    last_edit_at = Some(Instant::now());
                }
                AgentEvent::Complete { answer } => {
                    let final_text = if answer.is_empty() { accumulated.clone() } else { answer.clone() };
                    let delivered = match (&tracked_message_id, edit_capable) {
                        (Some(id), true) => self.channel.edit_message(id, &final_text).await,
                        _ => self.send_chunked(&final_text).await,
                    };
                    if let Err(e) = delivered {
                        tracing::warn!(error = %e, "channel_bridge: final delivery failed");
                    }
                    return BridgeOutcome::Completed { answer };
                }
                AgentEvent::Error { error } => {
                    let _ = self.send_chunked(&format!("Error: {error}")).await;
                    return BridgeOutcome::Errored { error };
                }
                AgentEvent::Aborted { reason } => {
                    return BridgeOutcome::Aborted { reason };
                }
            }
        }

        BridgeOutcome::Completed { answer: accumulated }
    }
}
