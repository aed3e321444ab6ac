//! Transport and control-plane collaborator traits.
//!
//! The gateway layer never opens sockets or issues HTTP requests itself. It
//! talks to a [`Connector`] that yields a [`Transport`] per connection, and
//! to a [`ControlPlane`] for endpoint discovery and outbound actions.
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = connector.connect(&gateway_url).await?;
//! transport.send(r#"{"s":2,"sn":6}"#.to_string()).await?;
//! while let Some(text) = transport.recv().await? {
//!     // decode the frame
//! }
//! transport.close().await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ControlPlaneError, ControlPlaneResult, TransportResult};

// =============================================================================
// Gateway Transport
// =============================================================================

/// One established persistent connection.
///
/// All methods take `&self`: a heartbeat sender, a receive loop and a
/// watchdog share the same transport concurrently. Implementations must
/// allow `send` and `close` to proceed while a `recv` is pending.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Writes one text frame.
    async fn send(&self, data: String) -> TransportResult<()>;

    /// Waits for the next text frame; `Ok(None)` signals a closed connection.
    async fn recv(&self) -> TransportResult<Option<String>>;

    /// Closes the connection. Calling it more than once is harmless.
    async fn close(&self) -> TransportResult<()>;
}

/// Type alias for a shared transport.
pub type BoxedTransport = Arc<dyn Transport>;

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a connection to `url`.
    async fn connect(&self, url: &str) -> TransportResult<BoxedTransport>;
}

/// Type alias for a shared connector.
pub type BoxedConnector = Arc<dyn Connector>;

// =============================================================================
// Control Plane
// =============================================================================

/// Authenticated HTTP API of a backend.
///
/// Responses are JSON objects. Implementations must turn a body whose `code`
/// field is present and non-zero into [`ControlPlaneError::Api`], see
/// [`check_response`].
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Issues a `GET` request to `path` with the given query parameters.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> ControlPlaneResult<Value>;

    /// Issues a `POST` request to `path` with a JSON body.
    async fn post(&self, path: &str, body: Value) -> ControlPlaneResult<Value>;
}

/// Type alias for a shared control plane.
pub type BoxedControlPlane = Arc<dyn ControlPlane>;

/// Validates a decoded response body.
///
/// A body carrying a non-zero numeric `code` is an application-level error.
/// Bodies without `code` are accepted as-is.
pub fn check_response(body: Value) -> ControlPlaneResult<Value> {
    let code = body.get("code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ControlPlaneError::Api { code, message });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn non_zero_code_is_api_error() {
        let err = check_response(json!({"code": 40100, "message": "bad token"})).unwrap_err();
        match err {
            ControlPlaneError::Api { code, message } => {
                assert_eq!(code, 40100);
                assert_eq!(message, "bad token");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_or_missing_code_is_ok() {
        assert!(check_response(json!({"code": 0, "data": {}})).is_ok());
        assert!(check_response(json!({"data": [1, 2]})).is_ok());
    }
}
