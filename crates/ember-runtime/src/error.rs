//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Building an adapter's control-plane client failed.
    #[error("Adapter setup failed for bot {bot_id}: {source}")]
    AdapterSetup {
        bot_id: String,
        #[source]
        source: ember_core::ControlPlaneError,
    },

    #[error("Bot not found: {0}")]
    BotNotFound(String),

    #[error("Bot already exists: {0}")]
    BotExists(String),

    /// `start` was called on an instance whose connection is still running.
    #[error("Bot is already running: {0}")]
    AlreadyRunning(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
