//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.locally/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::client::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::core::session::DEFAULT_ERROR_MESSAGE;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LocallyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HealthConfig {
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChatConfig {
    pub error_message: Option<String>,
    pub new_conversation_title: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONVERSATION_TITLE: &str = "New conversation";
const MIN_DURATION: Duration = Duration::from_secs(1);

pub const BASE_URL_ENV: &str = "LOCALLY_BASE_URL";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub health_interval: Duration,
    pub health_timeout: Duration,
    pub error_message: String,
    pub new_conversation_title: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        resolve_with_env(&LocallyConfig::default(), None, None)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.locally/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".locally").join("config.toml"))
}

/// Load config from `~/.locally/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `LocallyConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<LocallyConfig, ConfigError> {
    let Some(path) = config_path() else {
        warn!("Could not determine home directory, using default config");
        return Ok(LocallyConfig::default());
    };
    load_config_from(&path)
}

/// Same as [`load_config`] for an explicit path.
pub fn load_config_from(path: &Path) -> Result<LocallyConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(LocallyConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: LocallyConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

const DEFAULT_CONFIG_FILE: &str = r#"# Locally Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [server]
# base_url = "http://localhost:8000"   # Or set LOCALLY_BASE_URL, or pass --base-url
# request_timeout_secs = 30            # Non-streaming calls only

# [health]
# interval_secs = 300
# timeout_secs = 5

# [chat]
# error_message = "Error connecting to the server."
# new_conversation_title = "New conversation"
"#;

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, DEFAULT_CONFIG_FILE) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_base_url` is from the `--base-url` flag (None = not specified).
pub fn resolve(config: &LocallyConfig, cli_base_url: Option<&str>) -> ResolvedConfig {
    let env_base_url = std::env::var(BASE_URL_ENV).ok();
    resolve_with_env(config, env_base_url.as_deref(), cli_base_url)
}

/// Seconds from the config file, or `default`. Zero is raised to one second:
/// tokio intervals and reqwest timeouts need a non-zero duration.
fn secs(key: &str, value: Option<u64>, default: Duration) -> Duration {
    match value {
        Some(0) => {
            warn!("{} = 0 is not allowed, using 1", key);
            MIN_DURATION
        }
        Some(n) => Duration::from_secs(n),
        None => default,
    }
}

fn resolve_with_env(
    config: &LocallyConfig,
    env_base_url: Option<&str>,
    cli_base_url: Option<&str>,
) -> ResolvedConfig {
    // Base URL: CLI → env → config → default
    let base_url = cli_base_url
        .or(env_base_url)
        .map(str::to_string)
        .or_else(|| config.server.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    ResolvedConfig {
        base_url,
        request_timeout: secs(
            "server.request_timeout_secs",
            config.server.request_timeout_secs,
            DEFAULT_REQUEST_TIMEOUT,
        ),
        health_interval: secs(
            "health.interval_secs",
            config.health.interval_secs,
            DEFAULT_HEALTH_INTERVAL,
        ),
        health_timeout: secs(
            "health.timeout_secs",
            config.health.timeout_secs,
            DEFAULT_HEALTH_TIMEOUT,
        ),
        error_message: config
            .chat
            .error_message
            .clone()
            .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
        new_conversation_title: config
            .chat
            .new_conversation_title
            .clone()
            .unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string()),
    }
}
