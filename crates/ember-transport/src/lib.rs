//! # Ember Transport
//!
//! Concrete network collaborators for the Ember gateway layer.
//!
//! ## Features
//!
//! - `ws-client` (default): [`WsConnector`], a WebSocket [`Connector`](ember_core::Connector)
//! - `http-client` (default): [`HttpControlPlane`], a JSON [`ControlPlane`](ember_core::ControlPlane)
//! - `full`: both
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Adapter Layer      │  (KOOK, ...)
//! ├─────────────────────┤
//! │  ember-gateway      │  (state machine, supervisor)
//! ├─────────────────────┤
//! │  ember-core         │  (Transport / Connector / ControlPlane traits)
//! ├─────────────────────┤
//! │  ember-transport    │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (TCP/HTTP) │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ember_transport::{AuthScheme, HttpControlPlane, WsConnector};
//!
//! let api = HttpControlPlane::new("https://www.kookapp.cn/api/v3")?
//!     .with_token(AuthScheme::Bot, token);
//! let connector = WsConnector::new();
//! let transport = connector.connect(&gateway_url).await?;
//! ```

#[cfg(feature = "http-client")]
pub mod http;

#[cfg(feature = "ws-client")]
pub mod ws;

#[cfg(feature = "http-client")]
pub use http::{AuthScheme, HttpControlPlane};

#[cfg(feature = "ws-client")]
pub use ws::{WsConnector, WsTransport};
