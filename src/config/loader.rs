//! TOML configuration loading, env-var overrides, and atomic saves.
//!
//! # Loading order
//! 1. Parse `~/.corvid/config.toml` (or the path in `CORVID_CONFIG`)
//! 2. Apply `CORVID_*` environment variable overrides
//! 3. Fall back to [`AppConfig::default()`] if the file is missing
//!
//! # Atomic save
//! Writes to `<path>.tmp` → fsync → rename to `<path>` to avoid partial
//! writes corrupting the config file. The previous file is kept as
//! `<path>.bak`.

use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

use super::schema::AppConfig;

// ─── default_config_path ─────────────────────────────────────────────────────

/// Return the default config file path: `~/.corvid/config.toml`.
pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::home_dir()
        .map(|h| h.join(".corvid").join("config.toml"))
        .ok_or_else(|| "could not determine home directory".to_string())
}

// ─── load_config ─────────────────────────────────────────────────────────────

/// Load [`AppConfig`] from the given path, falling back to defaults if the
/// file does not exist, then applying environment variable overrides.
pub fn load_config(path: &Path) -> Result<AppConfig, String> {
    let mut config = match fs::read_to_string(path) {
        Ok(content) => toml::from_str::<AppConfig>(&content)
            .map_err(|e| format!("failed to parse config at {path:?}: {e}"))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => return Err(format!("failed to read config at {path:?}: {e}")),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load config from the default path (or `CORVID_CONFIG` if set).
pub fn load_default_config() -> AppConfig {
    let path = env::var("CORVID_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            default_config_path().unwrap_or_else(|_| PathBuf::from("config.toml"))
        });

    load_config(&path).unwrap_or_default()
}

// ─── apply_env_overrides ─────────────────────────────────────────────────────

/// Apply `CORVID_*` environment variable overrides to `config`.
///
/// Supported overrides:
/// - `CORVID_PROVIDER_ID`        → `providers.default_id`
/// - `CORVID_PROVIDER_MODEL`     → `providers.default_model`
/// - `CORVID_AUTONOMY_LEVEL`     → `autonomy.level`
/// - `CORVID_SCHEDULER_TICK_MS`  → `scheduler.tick_ms`
/// - `CORVID_MEMORY_ENABLED`     → `memory.enabled` (1/0)
/// - `CORVID_NOTIFICATIONS_ENABLED` → `notifications.enabled` (1/0)
/// - `CORVID_DO_NOT_DISTURB`     → `notifications.do_not_disturb` (1/0)
fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(v) = env::var("CORVID_PROVIDER_ID") {
        config.providers.default_id = v;
    }
    if let Ok(v) = env::var("CORVID_PROVIDER_MODEL") {
        config.providers.default_model = v;
    }
    if let Ok(v) = env::var("CORVID_AUTONOMY_LEVEL") {
        config.autonomy.level = v;
    }
    if let Ok(v) = env::var("CORVID_SCHEDULER_TICK_MS") {
        if let Ok(ms) = v.parse::<u64>() {
            config.scheduler.tick_ms = ms;
        }
    }
    if let Ok(v) = env::var("CORVID_MEMORY_ENABLED") {
        config.memory.enabled = v == "1" || v.eq_ignore_ascii_case("true");
    }
    if let Ok(v) = env::var("CORVID_NOTIFICATIONS_ENABLED") {
        config.notifications.enabled = v == "1" || v.eq_ignore_ascii_case("true");
    }
    if let Ok(v) = env::var("CORVID_DO_NOT_DISTURB") {
        config.notifications.do_not_disturb = v == "1" || v.eq_ignore_ascii_case("true");
    }
}

// ─── save_config ─────────────────────────────────────────────────────────────

/// Atomically save `config` to `path`.
///
/// Writes to `<path>.tmp`, creates a backup of the existing file as
/// `<path>.bak`, then renames the temp file to `<path>`.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), String> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| format!("failed to serialise config: {e}"))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create config dir: {e}"))?;
    }

    let tmp_path = path.with_extension("toml.tmp");

    fs::write(&tmp_path, &content)
        .map_err(|e| format!("failed to write temp config: {e}"))?;

    if path.exists() {
        let bak_path = path.with_extension("toml.bak");
        fs::copy(path, &bak_path)
            .map_err(|e| format!("failed to backup config: {e}"))?;
    }

    fs::rename(&tmp_path, path)
        .map_err(|e| format!("failed to replace config file: {e}"))?;

    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
