//! The canvas WebSocket bridge and the chat-app streaming bridge. The
//! whole module is gated behind the `gateway` feature since it pulls in
//! axum/tower-http.

pub mod channel_bridge;
pub mod ws;

pub use channel_bridge::ChannelBridge;
pub use ws::{WsState, ws_handler};
