//! Process-wide logging setup.
//!
//! Everything logs through `tracing`; this crate only decides where records
//! go and which ones are kept.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging subsystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Default level. Overridden by `RUST_LOG`.
    pub level: String,
    /// Per-module level overrides (e.g. `"arcade_server::handlers" => "debug"`).
    pub module_levels: Vec<(String, String)>,
    /// Emit one JSON object per record instead of human-readable lines.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            module_levels: Vec::new(),
            json: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),
    #[error("logging already initialised: {0}")]
    AlreadyInitialised(String),
}

impl TelemetryConfig {
    /// Filter directive string built from the configured levels.
    pub fn filter_directives(&self) -> Result<String, TelemetryError> {
        let mut directives = parse_level(&self.level)?.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            let level = parse_level(level)?;
            directives.push_str(&format!(",{module}={}", level.to_string().to_lowercase()));
        }
        Ok(directives)
    }
}

fn parse_level(level: &str) -> Result<Level, TelemetryError> {
    Level::from_str(level.trim()).map_err(|_| TelemetryError::InvalidLevel(level.to_owned()))
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let directives = config.filter_directives()?;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialised(e.to_string()))
}
