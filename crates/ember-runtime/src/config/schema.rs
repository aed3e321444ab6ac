//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use ember_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
///
/// ```toml
/// [logging]
/// level = "debug"
/// format = "pretty"
///
/// [logging.filters]
/// ember_gateway = "trace"
///
/// [gateway]
/// heartbeat_interval = 30
/// reconnect_delay = 10
///
/// [[bots]]
/// id = "1234567890"
/// token = "..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EmberConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Gateway timing shared by every bot.
    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub bots: Vec<BotConfig>,
}

impl EmberConfig {
    /// Bots with `enabled = true`, in declaration order.
    pub fn enabled_bots(&self) -> impl Iterator<Item = &BotConfig> {
        self.bots.iter().filter(|bot| bot.enabled)
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of the fmt layer.
///
/// `json` requires the `json-log` feature and falls back to `full` without it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Minutely,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Base level, overridden entirely by `RUST_LOG` when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line number.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-module levels, e.g. `ember_gateway = "trace"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,
}

// =============================================================================
// Gateway
// =============================================================================

/// Gateway timing in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,

    #[serde(default = "default_ack_timeout")]
    pub ack_timeout: u64,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: u64,

    /// Inbound frames processed concurrently per bot.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Inbound frames allowed to wait for a worker slot per bot.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            ack_timeout: default_ack_timeout(),
            reconnect_delay: default_reconnect_delay(),
            max_in_flight: default_max_in_flight(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl GatewaySettings {
    pub fn to_gateway_config(&self) -> GatewayConfig {
        GatewayConfig::default()
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_interval))
            .with_ack_timeout(Duration::from_secs(self.ack_timeout))
            .with_reconnect_delay(Duration::from_secs(self.reconnect_delay))
            .with_max_in_flight(self.max_in_flight)
            .with_queue_capacity(self.queue_capacity)
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_ack_timeout() -> u64 {
    30
}

fn default_reconnect_delay() -> u64 {
    10
}

fn default_max_in_flight() -> usize {
    64
}

fn default_queue_capacity() -> usize {
    1024
}

// =============================================================================
// Bots
// =============================================================================

/// One bot account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Account id, also the key bots are looked up by.
    pub id: String,

    /// Adapter name; only `"kook"` is built in.
    #[serde(default = "default_adapter")]
    pub adapter: String,

    #[serde(default)]
    pub token: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Control-plane base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl BotConfig {
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            adapter: default_adapter(),
            token: token.into(),
            enabled: true,
            base_url: None,
        }
    }
}

fn default_adapter() -> String {
    "kook".to_string()
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_defaults_match_gateway_config() {
        assert_eq!(
            GatewaySettings::default().to_gateway_config(),
            GatewayConfig::default()
        );
    }

    #[test]
    fn seconds_become_durations() {
        let settings = GatewaySettings {
            heartbeat_interval: 5,
            ack_timeout: 3,
            reconnect_delay: 1,
            max_in_flight: 8,
            queue_capacity: 16,
        };
        let config = settings.to_gateway_config();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.ack_timeout, Duration::from_secs(3));
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.max_in_flight, 8);
        assert_eq!(config.queue_capacity, 16);
    }

    #[test]
    fn disabled_bots_are_skipped() {
        let mut off = BotConfig::new("2", "t");
        off.enabled = false;
        let config = EmberConfig {
            bots: vec![BotConfig::new("1", "t"), off],
            ..Default::default()
        };
        let ids: Vec<_> = config.enabled_bots().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }
}
