//! Configuration module for the Ember runtime.
//!
//! Layered loading (defaults, files, environment) through figment, plus the
//! schema and its validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, EmberConfig, GatewaySettings, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, SpanEventConfig,
};
pub use validation::{KNOWN_ADAPTERS, validate_config};
