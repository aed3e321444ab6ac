//! Per-backend collaborators used by the state machine.

use async_trait::async_trait;
use serde_json::Value;

use ember_core::{ControlPlaneResult, Inbound, NormalizeError};

/// Maps one data-frame payload to the canonical shape.
///
/// `Ok(None)` means the payload was understood but there is nothing to
/// dispatch (for example a message authored by the bot itself).
pub trait Normalizer: Send + Sync {
    fn normalize(&self, payload: &Value) -> Result<Option<Inbound>, NormalizeError>;
}

/// Discovers the gateway endpoint through the control plane.
#[async_trait]
pub trait GatewayLocator: Send + Sync {
    async fn gateway_url(&self) -> ControlPlaneResult<String>;
}
