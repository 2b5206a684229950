//! Channel abstraction layer for inbound/outbound agent messaging.
//!
//! A **channel** is any transport layer that delivers [`traits::ChannelMessage`]s
//! between the agent runtime and an external peer. Concrete channel adapters
//! (a chat app, a webhook receiver, a desktop IPC bridge) are host-provided:
//! the core only defines the [`Channel`] trait and the [`ChannelManager`] that
//! aggregates registered channels into a single inbound stream.
//!
//! # Architecture
//!
//! ```text
//!   external transport (webhook, chat API, desktop IPC, ...)
//!         │
//!         ▼
//!   ┌─────────────┐
//!   │  Channel    │  (host-provided impl)
//!   └──────┬──────┘
//!          │ mpsc::Sender<ChannelMessage>
//!          ▼
//!   ┌─────────────────┐
//!   │  ChannelManager │  aggregates all channels into one receiver
//!   └──────┬──────────┘
//!          │ mpsc::Receiver<ChannelMessage>
//!          ▼
//!   Message Router → Session → Agent Loop
//! ```

pub mod manager;
pub mod traits;

pub use manager::ChannelManager;
pub use traits::{Channel, ChannelEvent, ChannelMessage};
