//! S4 (streaming edit bridge) from the end-to-end scenario set. Requires
//! the `gateway` feature, which is where [`ChannelBridge`] lives.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use corvid_core::agent::events::AgentEvent;
use corvid_core::channels::{Channel, ChannelMessage};
use corvid_core::gateway::channel_bridge::ChannelBridge;

struct EditableChannel {
    sent: std::sync::Mutex<Vec<String>>,
    edited: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl Channel for EditableChannel {
    fn name(&self) -> &str {
        "editable"
    }
    async fn send(&self, message: &str, _recipient: Option<&str>) -> Result<(), String> {
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }
    async fn listen(&self, _tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> Result<(), String> {
        Ok(())
    }
    async fn health_check(&self) -> bool {
        true
    }
    fn supports_edit(&self) -> bool {
        true
    }
    async fn edit_message(&self, _message_id: &str, content: &str) -> Result<(), String> {
        self.edited.lock().unwrap().push(content.to_string());
        Ok(())
    }
    async fn send_trackable(&self, message: &str, recipient: Option<&str>) -> Result<Option<String>, String> {
        self.send(message, recipient).await?;
        Ok(Some("m1".to_string()))
    }
}

#[tokio::test]
async fn s4_editable_channel_sends_once_then_edits_as_deltas_arrive() {
    let channel = Arc::new(EditableChannel { sent: Default::default(), edited: Default::default() });
    let bridge = ChannelBridge::new(channel.clone(), None).with_min_edit_interval(Duration::ZERO);
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tx.send(AgentEvent::Text { delta: "Hel".into(), partial: "Hel".into() }).unwrap();
    tx.send(AgentEvent::Text { delta: "lo".into(), partial: "Hello".into() }).unwrap();
    tx.send(AgentEvent::Text { delta: " world".into(), partial: "Hello world".into() }).unwrap();
    tx.send(AgentEvent::Complete { answer: "Hello world!".into() }).unwrap();
    drop(tx);

    bridge.run(rx).await;

    assert_eq!(channel.sent.lock().unwrap().len(), 1, "exactly one initial send");
    // 2 edits from deltas, plus the final edit on complete.
    assert_eq!(channel.edited.lock().unwrap().len(), 3);
    assert_eq!(channel.edited.lock().unwrap().last().unwrap(), "Hello world!");
}

struct ResendOnlyChannel {
    sent: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl Channel for ResendOnlyChannel {
    fn name(&self) -> &str {
        "resend-only"
    }
    async fn send(&self, message: &str, _recipient: Option<&str>) -> Result<(), String> {
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }
    async fn listen(&self, _tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> Result<(), String> {
        Ok(())
    }
    async fn health_check(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn s4_non_editable_channel_sends_only_the_final_answer() {
    let channel = Arc::new(ResendOnlyChannel { sent: Default::default() });
    let bridge = ChannelBridge::new(channel.clone(), None);
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tx.send(AgentEvent::Text { delta: "Hel".into(), partial: "Hel".into() }).unwrap();
    tx.send(AgentEvent::Text { delta: "lo".into(), partial: "Hello".into() }).unwrap();
    tx.send(AgentEvent::Complete { answer: "Hello world!".into() }).unwrap();
    drop(tx);

    bridge.run(rx).await;

    let sent = channel.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], "Hello world!");
}
