//! # Ember Adapter for KOOK
//!
//! Connects Ember to the KOOK bot gateway.
//!
//! This adapter handles:
//!
//! - account identification through `/user/me`
//! - gateway discovery through `/gateway/index` ([`KookApi`] is the
//!   [`GatewayLocator`](ember_gateway::GatewayLocator))
//! - payload normalization ([`KookNormalizer`]), including system events
//! - replies rendered as KMarkdown and image messages ([`KookBot`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ember_adapter_kook::{KookAdapter, KookConfig};
//! use ember_gateway::GatewayConfig;
//!
//! let adapter = Arc::new(KookAdapter::new(
//!     KookConfig::new("1234567890", std::env::var("KOOK_TOKEN")?),
//!     GatewayConfig::default(),
//! )?);
//! adapter.connect(dispatcher.bind(adapter.bot())).await?;
//! ```

mod adapter;
pub mod api;
pub mod bot;
pub mod config;
pub mod normalize;

#[cfg(test)]
pub(crate) mod test_support;

pub use adapter::KookAdapter;
pub use api::{KookApi, KookMessageType, KookUser};
pub use bot::{BotIdentity, KookBot, render_kmarkdown};
pub use config::{DEFAULT_BASE_URL, KookConfig};
pub use normalize::{KookNormalizer, strip_mentions};
