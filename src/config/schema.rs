//! TOML configuration schema.
//!
//! All fields have `#[serde(default)]` so a partially-filled `config.toml`
//! works correctly. Missing sections fall back to their `Default` impl.
//! Unknown top-level keys are preserved via `extra` rather than rejected,
//! so a config written by a newer binary still round-trips through an
//! older one.
//!
//! Example `~/.corvid/config.toml`:
//! ```toml
//! [providers]
//! default_id = "openai"
//! default_model = "gpt-4o-mini"
//!
//! [security]
//! workspace_root = "/home/user/workspace"
//!
//! [autonomy]
//! level = "supervised"
//!
//! [identity]
//! name = "corvid"
//!
//! [canvas]
//! max_components = 200
//! ```

use serde::{Deserialize, Serialize};

// ─── ProvidersConfig ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    /// ID of the default LLM provider (e.g. `"openai"`, `"anthropic"`).
    pub default_id: String,
    /// Default model identifier (e.g. `"gpt-4o-mini"`, `"claude-3-haiku"`).
    pub default_model: String,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum retry attempts on transient errors.
    pub max_retries: u32,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default_id: "openai".to_owned(),
            default_model: "gpt-4o-mini".to_owned(),
            request_timeout_secs: 60,
            max_retries: 3,
        }
    }
}

// ─── EnginesConfig ────────────────────────────────────────────────────────────

/// Per-engine overrides, keyed by engine id. Engines not listed use the
/// defaults baked into whatever `EngineRegistry` the host wires up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EnginesConfig {
    pub overrides: std::collections::HashMap<String, EngineOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EngineOverride {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub max_context_tokens: Option<usize>,
}

// ─── AgentConfig ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: usize,
    pub max_retries: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub memory_recall_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            memory_recall_limit: 5,
        }
    }
}

// ─── CanvasConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CanvasConfig {
    /// Cap on the number of live components per canvas (§3 `maxComponents`).
    pub max_components: usize,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self { max_components: 200 }
    }
}

// ─── GatewayConfig ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub enabled: bool,
    pub bind_addr: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: "127.0.0.1".to_owned(),
            port: 8420,
        }
    }
}

// ─── ObservabilityConfig ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `tracing_subscriber` env-filter directive, e.g. `"corvid_core=debug"`.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_owned() }
    }
}

// ─── SecurityConfig ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Optional workspace root path (restricts file tool access).
    pub workspace_root: Option<String>,
    /// Commands blocked regardless of autonomy level.
    pub blocked_commands: Vec<String>,
    /// Rate limit: max tool calls per minute.
    pub rate_limit_per_minute: u32,
    /// Rate limit: max tool calls per hour.
    pub rate_limit_per_hour: u32,
    /// Reject symlinks that resolve outside the workspace or a blocked prefix.
    pub enforce_symlink_boundary: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            blocked_commands: Vec::new(),
            rate_limit_per_minute: 60,
            rate_limit_per_hour: 600,
            enforce_symlink_boundary: true,
        }
    }
}

// ─── AutonomyConfig ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutonomyConfig {
    /// `"readonly"`, `"supervised"`, or `"autonomous"`.
    pub level: String,
}

impl Default for AutonomyConfig {
    fn default() -> Self {
        Self { level: "supervised".to_owned() }
    }
}

// ─── SchedulerConfig ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick interval in milliseconds (§4.5 default 60 000).
    pub tick_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_ms: 60_000 }
    }
}

// ─── MemoryConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Whether the memory subsystem is enabled.
    pub enabled: bool,
    /// Maximum number of entries returned by recall.
    pub recall_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recall_limit: 10,
        }
    }
}

// ─── SkillsConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SkillsConfig {
    pub enabled: Vec<String>,
}

// ─── IdentityConfig ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    pub name: String,
    pub persona: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { name: "assistant".to_owned(), persona: None }
    }
}

// ─── SearchConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SearchConfig {
    pub provider: Option<String>,
    pub api_key_env: Option<String>,
}

// ─── X402Config ───────────────────────────────────────────────────────────────

/// Settings for the x402 payment plugin seam.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct X402Config {
    pub enabled: bool,
    pub network: Option<String>,
    pub facilitator_url: Option<String>,
}

// ─── VoiceConfig ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    pub voice_id: Option<String>,
}

// ─── NotificationsConfig ──────────────────────────────────────────────────────

fn default_dnd_start() -> u8 {
    22 // 10 pm
}

fn default_dnd_end() -> u8 {
    7 // 7 am
}

fn bool_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub do_not_disturb: bool,
    pub dnd_schedule_enabled: bool,
    #[serde(default = "default_dnd_start")]
    pub dnd_start_hour: u8,
    #[serde(default = "default_dnd_end")]
    pub dnd_end_hour: u8,
    pub categories: std::collections::HashMap<String, bool>,
    #[serde(default = "bool_true")]
    pub notify_heartbeat: bool,
    #[serde(default = "bool_true")]
    pub notify_cron_reminder: bool,
    #[serde(default = "bool_true")]
    pub notify_agent_complete: bool,
    #[serde(default = "bool_true")]
    pub notify_approval_request: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            do_not_disturb: false,
            dnd_schedule_enabled: false,
            dnd_start_hour: default_dnd_start(),
            dnd_end_hour: default_dnd_end(),
            categories: std::collections::HashMap::new(),
            notify_heartbeat: true,
            notify_cron_reminder: true,
            notify_agent_complete: true,
            notify_approval_request: true,
        }
    }
}

// ─── AppConfig ────────────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// Loaded from `~/.corvid/config.toml`, falling back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub canvas: CanvasConfig,
    pub gateway: GatewayConfig,
    pub agent: AgentConfig,
    pub providers: ProvidersConfig,
    pub engines: EnginesConfig,
    pub observability: ObservabilityConfig,
    pub memory: MemoryConfig,
    pub skills: SkillsConfig,
    pub security: SecurityConfig,
    pub autonomy: AutonomyConfig,
    pub identity: IdentityConfig,
    pub search: SearchConfig,
    pub x402: X402Config,
    pub voice: VoiceConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationsConfig,
    /// Keys this binary doesn't know about yet; preserved verbatim on save.
    #[serde(flatten)]
    pub extra: toml::Table,
}
