//! Gateway session protocol for Ember.
//!
//! - [`Frame`] / [`FrameKind`]: the `{ s, d, sn }` wire format.
//! - [`SessionState`]: cached endpoint, resume token and last sequence.
//! - [`ProtocolStateMachine`]: one connection attempt with handshake,
//!   sequence tracking, heartbeat watchdog, resume and reconnect handling.
//! - [`ConnectionSupervisor`]: restarts the state machine after a fixed delay
//!   until closed.
//! - [`WorkerPool`]: bounded hand-off of inbound frames to handlers.

pub mod config;
pub mod frame;
pub mod machine;
pub mod normalizer;
pub mod pool;
pub mod session;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::GatewayConfig;
pub use frame::{Frame, FrameKind};
pub use machine::ProtocolStateMachine;
pub use normalizer::{GatewayLocator, Normalizer};
pub use pool::WorkerPool;
pub use session::{ConnectionState, Observed, SessionState};
pub use supervisor::ConnectionSupervisor;
