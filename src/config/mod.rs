//! Configuration: TOML schema, loading, env-var overrides, atomic saves.

pub mod loader;
pub mod schema;

pub use loader::{default_config_path, load_config, load_default_config, save_config};
pub use schema::{
    AgentConfig, AppConfig, AutonomyConfig, CanvasConfig, EngineOverride, EnginesConfig,
    GatewayConfig, IdentityConfig, MemoryConfig, NotificationsConfig, ObservabilityConfig,
    ProvidersConfig, SchedulerConfig, SearchConfig, SecurityConfig, SkillsConfig, VoiceConfig,
    X402Config,
};
