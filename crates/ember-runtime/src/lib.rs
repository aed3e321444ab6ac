//! Ember Runtime - configuration, logging and bot orchestration.
//!
//! This crate provides:
//! - Layered configuration ([`ConfigLoader`], [`EmberConfig`]) via figment
//! - Logging setup ([`LoggingBuilder`], [`logging::init_from_config`])
//! - Bot instances ([`BotInstance`]): one adapter plus its handler registry
//! - Runtime orchestration ([`EmberRuntime`])
//!
//! ```text
//! ember.toml ─┐
//! EMBER_*    ─┴─▶ EmberConfig ─▶ EmberRuntime ─┬─▶ BotInstance "1" ─▶ KookAdapter ─▶ Dispatcher
//!                                              └─▶ BotInstance "2" ─▶ KookAdapter ─▶ Dispatcher
//! ```
//!
//! ```rust,ignore
//! use ember_runtime::EmberRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = EmberRuntime::builder().build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod instance;
pub mod logging;
pub mod runtime;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, EmberConfig, GatewaySettings,
    LoggingConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use instance::BotInstance;
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{EmberRuntime, RuntimeBuilder};

// Re-export tracing for use by bot crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for bot code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
