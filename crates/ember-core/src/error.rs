//! Unified error types for the Ember core.
//!
//! Dispatch-level failures are modelled separately as [`HandlerFault`]
//! (see [`crate::fault`]) because they are routed to exception handlers
//! instead of being propagated.
//!
//! [`HandlerFault`]: crate::fault::HandlerFault

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised by a [`Transport`](crate::transport::Transport) or
/// [`Connector`](crate::transport::Connector).
///
/// Every variant is treated as a lost connection by the gateway layer.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed by either side.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Outgoing frame could not be written.
    #[error("failed to send frame: {0}")]
    SendFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Creates a connection-closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Control-Plane Errors
// =============================================================================

/// Errors returned by the HTTP control plane.
///
/// These are surfaced to whoever issued the request and are never retried
/// automatically.
#[derive(Debug, Clone, Error)]
pub enum ControlPlaneError {
    /// The backend answered with a non-zero application `code`.
    #[error("API error ({code}): {message}")]
    Api {
        /// Application-level error code.
        code: i64,
        /// Message reported by the backend.
        message: String,
    },

    /// Non-success HTTP status or request failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The response body was not the expected JSON shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The target of the operation is missing (e.g. neither channel nor user).
    #[error("missing target: {0}")]
    MissingTarget(&'static str),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<serde_json::Error> for ControlPlaneError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

// =============================================================================
// Gateway Errors
// =============================================================================

/// Errors that end one gateway connection attempt.
///
/// None of these escape the connection supervisor: each one is logged and
/// followed by a reconnect after the configured delay.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Transport failure or connection loss.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Gateway discovery or identity lookup failed.
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    /// The backend rejected the handshake.
    #[error("handshake rejected with code {code}")]
    HandshakeRejected {
        /// Code carried by the handshake frame.
        code: i64,
    },

    /// A frame could not be decoded.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The backend asked for a fresh session.
    #[error("backend requested reconnect")]
    ReconnectRequested,

    /// No heartbeat ack arrived before the watchdog deadline.
    #[error("heartbeat ack not received within {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    /// The connection was closed locally.
    #[error("connection closed")]
    Closed,

    /// `connect` was called while a connect loop is already running.
    #[error("connection supervisor is already running")]
    AlreadyRunning,
}

// =============================================================================
// Registration Errors
// =============================================================================

/// Rejections raised synchronously by plugin install/uninstall.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationConflict {
    /// A plugin with this identifier is already installed.
    #[error("plugin id '{0}' already exists")]
    DuplicatePlugin(String),

    /// The reserved host-factory slot cannot be used by plugins.
    #[error("plugin id '{0}' is reserved")]
    ReservedSlot(String),

    /// No plugin with this identifier is installed.
    #[error("plugin '{0}' is not installed")]
    UnknownPlugin(String),
}

// =============================================================================
// Normalization Errors
// =============================================================================

/// A payload could not be mapped into the canonical shape.
#[derive(Debug, Clone, Error)]
#[error("failed to normalize payload: {reason}")]
pub struct NormalizeError {
    /// Reason for failure.
    pub reason: String,
}

impl NormalizeError {
    /// Creates a normalization error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for control-plane calls.
pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
