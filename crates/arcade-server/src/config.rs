//! Server configuration.
//!
//! Loading flow:
//! 1. Start with compiled [`Config::default()`]
//! 2. If a config file is given, deep-merge its values over the defaults
//! 3. Apply `ARCADE_*` environment variable overrides
//! 4. Validate

use std::path::Path;

use arcade_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node name, reported by the health endpoint.
    pub name: String,
    pub socket: SocketConfig,
    pub session: SessionConfig,
    pub matchmaker: MatchmakerConfig,
    pub log: TelemetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "arcade".into(),
            socket: SocketConfig::default(),
            session: SessionConfig::default(),
            matchmaker: MatchmakerConfig::default(),
            log: TelemetryConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    pub host: String,
    /// `0` picks a free port.
    pub port: u16,
    /// Largest accepted WebSocket message.
    pub max_message_size_bytes: usize,
    /// Per-session outbound queue length.
    pub outgoing_queue_size: usize,
    pub ping_interval_ms: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7350,
            max_message_size_bytes: 1024 * 1024,
            outgoing_queue_size: 64,
            ping_interval_ms: 15_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Key material for server-signed tokens.
    pub encryption_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            encryption_key: "defaultencryptionkey".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakerConfig {
    /// Lifetime of match tokens handed out on a successful matchmake.
    pub token_expiry_ms: u64,
    /// Largest group a client may ask the matchmaker for.
    pub max_count: u32,
}

impl Default for MatchmakerConfig {
    fn default() -> Self {
        Self {
            token_expiry_ms: 30_000,
            max_count: 16,
        }
    }
}

/// Upper bound on `matchmaker.token_expiry_ms` (one day).
pub const MAX_TOKEN_EXPIRY_MS: u64 = 24 * 60 * 60 * 1000;

impl Config {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.encryption_key.is_empty() {
            return Err(ConfigError::InvalidValue(
                "session.encryption_key must not be empty".into(),
            ));
        }
        if self.socket.outgoing_queue_size == 0 {
            return Err(ConfigError::InvalidValue(
                "socket.outgoing_queue_size must be at least 1".into(),
            ));
        }
        if self.socket.max_message_size_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "socket.max_message_size_bytes must be at least 1".into(),
            ));
        }
        if self.socket.ping_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "socket.ping_interval_ms must be at least 1".into(),
            ));
        }
        if self.matchmaker.token_expiry_ms == 0
            || self.matchmaker.token_expiry_ms > MAX_TOKEN_EXPIRY_MS
        {
            return Err(ConfigError::InvalidValue(format!(
                "matchmaker.token_expiry_ms must be between 1 and {MAX_TOKEN_EXPIRY_MS}"
            )));
        }
        if self.matchmaker.max_count < 2 {
            return Err(ConfigError::InvalidValue(
                "matchmaker.max_count must be at least 2".into(),
            ));
        }
        self.log
            .filter_directives()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        Ok(())
    }
}

/// Load configuration from an optional file plus environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let defaults = serde_json::to_value(Config::default())?;

    let merged = match path {
        Some(path) => {
            debug!(?path, "loading config from file");
            let content = std::fs::read_to_string(path)?;
            let user: Value = serde_json::from_str(&content)?;
            deep_merge(defaults, user)
        }
        None => defaults,
    };

    let mut config: Config = serde_json::from_value(merged)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key, everything else is replaced by `source`, and nulls
/// in `source` leave `target` untouched.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment overrides read through `lookup`.
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ARCADE_NAME").filter(|v| !v.is_empty()) {
        config.name = v;
    }
    if let Some(v) = lookup("ARCADE_HOST").filter(|v| !v.is_empty()) {
        config.socket.host = v;
    }
    if let Some(v) = lookup("ARCADE_PORT").and_then(|v| parse_u16(&v)) {
        config.socket.port = v;
    }
    if let Some(v) = lookup("ARCADE_ENCRYPTION_KEY").filter(|v| !v.is_empty()) {
        config.session.encryption_key = v;
    }
    if let Some(v) = lookup("ARCADE_LOG_LEVEL").filter(|v| !v.is_empty()) {
        config.log.level = v;
    }
    if let Some(v) = lookup("ARCADE_LOG_JSON").and_then(|v| parse_bool(&v)) {
        config.log.json = v;
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a port number.
pub fn parse_u16(val: &str) -> Option<u16> {
    val.trim().parse().ok()
}
