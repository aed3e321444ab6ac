//! # Ember
//!
//! A bot framework for gateway-style chat backends.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐  frames  ┌────────────┐  Inbound  ┌────────────┐  reply  ┌─────┐
//! │ ConnectionSupervisor │─────────▶│ Normalizer │──────────▶│ Dispatcher │────────▶│ Bot │
//! │ (ProtocolStateMachine)│◀── hb ──│  (adapter) │           │ (registry) │         └─────┘
//! └──────────────────────┘          └────────────┘           └────────────┘
//! ```
//!
//! - **Gateway**: one supervised WebSocket session per bot with heartbeat,
//!   resume and fixed-delay reconnect
//! - **Adapters**: per-platform API, payload normalization and reply rendering
//!   (KOOK is built in)
//! - **Registry**: the host's handlers merged with installed plugins
//! - **Dispatcher**: picks the best-weighted handler, runs reply hooks and
//!   routes faults to the nearest exception handler
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use ember::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(HandlerRegistry::new());
//!     registry.add_prefix_keywords(["/"]);
//!     registry.on_message(
//!         on_message()
//!             .keywords(["ping"])
//!             .check_prefix(true)
//!             .handler(|_ctx: MessageContext| async { "pong" }),
//!     );
//!
//!     EmberRuntime::builder().registry(registry).build()?.run().await?;
//!     Ok(())
//! }
//! ```

pub use ember_adapter_kook as kook;
pub use ember_core as core;
pub use ember_framework as framework;
pub use ember_gateway as gateway;
pub use ember_runtime as runtime;
pub use ember_transport as transport;

/// Starts a [`HandlerSpec`](ember_framework::HandlerSpec) builder.
pub fn on_message() -> ember_framework::HandlerSpecBuilder {
    ember_framework::HandlerSpec::builder()
}

/// Commonly used types for building bots.
///
/// ```rust,ignore
/// use ember::prelude::*;
/// ```
pub mod prelude {
    pub use crate::on_message;

    // Runtime
    pub use ember_runtime::{BotInstance, EmberConfig, EmberRuntime};

    // Registration
    pub use ember_framework::{
        CheckPrefix, Dispatcher, GroupConfig, HandlerFactory, HandlerRegistry, HandlerSpec,
        Keyword, Plugin, PluginInstance, PluginMetadata,
    };

    // Handler contexts
    pub use ember_framework::{EventContext, FaultContext, MessageContext};

    // Data model
    pub use ember_core::{
        Bot, BoxedBot, FaultKind, HandlerFault, HandlerResult, Keypoint, NormalizedEvent,
        NormalizedMessage, Reply, Target, VerifyResult,
    };
}
