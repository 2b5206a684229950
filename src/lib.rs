pub mod agent;
pub mod ai;
pub mod canvas;
pub mod channels;
pub mod config;
pub mod context;
pub mod error;
pub mod event_bus;
#[cfg(feature = "gateway")]
pub mod gateway;
pub mod identity;
pub mod memory;
pub mod router;
pub mod scheduler;
pub mod security;
pub mod session;
pub mod tools;
pub mod verifier;

pub use error::CoreError;

/// Convenience re-exports for the most commonly used traits and types
/// across the crate.
///
/// ```rust
/// use corvid_core::prelude::*;
/// ```
pub mod prelude {
    // AI provider trait
    pub use crate::ai::provider::LLMProvider;
    pub use crate::ai::types::{CompletionRequest, CompletionResponse, Message, MessageRole};

    // Agent loop
    pub use crate::agent::{AgentEvent, AgentLoop, AgentLoopConfig, TurnVerifier};

    // Tool system
    pub use crate::tools::{Tool, ToolRegistry, ToolResult};

    // Memory subsystem
    pub use crate::memory::{Memory, MemoryCategory, MemoryEntry};

    // Security
    pub use crate::security::{AutonomyLevel, SecurityPolicy, ValidationResult};

    // Event bus
    pub use crate::event_bus::{AppEvent, EventBus, TokioBroadcastBus};

    // Scheduler
    pub use crate::scheduler::{JobPayload, Scheduler};

    // Configuration
    pub use crate::config::{AppConfig, load_default_config};

    // Identity
    pub use crate::identity::{IdentityProvider, IdentitySnapshot};

    // Channel abstraction
    pub use crate::channels::{Channel, ChannelManager, ChannelMessage};

    // Routing and sessions
    pub use crate::router::MessageRouter;
    pub use crate::session::{Session, SessionManager};

    // Canvas
    pub use crate::canvas::CanvasState;

    // Verification
    pub use crate::verifier::Verifier;

    pub use crate::error::CoreError;
}
