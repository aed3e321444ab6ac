//! Framework error types.

use thiserror::Error;

use ember_core::{HandlerFault, RegistrationConflict};

/// Errors returned by plugin installation.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The plugin id is taken, reserved or unknown.
    #[error(transparent)]
    Conflict(#[from] RegistrationConflict),

    /// The plugin's install hook failed; the plugin was not installed.
    #[error("plugin '{id}' failed to install: {fault}")]
    InstallFailed {
        id: String,
        fault: HandlerFault,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
