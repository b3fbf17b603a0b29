//! Tracing subscriber setup.

use std::fmt;
use std::str::FromStr;

use tessera_core::{ConfigError, TesseraResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "tessera=debug,info";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Compact,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Compact => write!(f, "compact"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "compact" | "pretty" | "text" => Ok(LogFormat::Compact),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Log line format
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    /// Reads `TESSERA_SERVICE_NAME` and `TESSERA_LOG_FORMAT`. An unknown
    /// format falls back to JSON.
    fn default() -> Self {
        Self {
            service_name: std::env::var("TESSERA_SERVICE_NAME")
                .unwrap_or_else(|_| "tessera-client".to_string()),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            format: std::env::var("TESSERA_LOG_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. A second call fails because a global subscriber is
/// already set.
pub fn init_tracing(config: &TelemetryConfig) -> TesseraResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ConfigError::InitFailed {
            component: "tracing subscriber".to_string(),
            reason: e.to_string(),
        })?;

    tracing::info!(
        service_name = %config.service_name,
        service_version = %config.service_version,
        format = %config.format,
        "Telemetry initialized"
    );
    Ok(())
}
