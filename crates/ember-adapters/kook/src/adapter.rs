//! KOOK adapter.
//!
//! ```rust,ignore
//! use ember_adapter_kook::{KookAdapter, KookConfig};
//!
//! let adapter = KookAdapter::new(KookConfig::new("1234567890", token), GatewayConfig::default())?;
//! adapter.connect(handler).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use ember_core::{
    Adapter, BoxedBot, BoxedConnector, BoxedControlPlane, BoxedInboundHandler, ControlPlaneResult,
    GatewayResult,
};
use ember_gateway::{
    ConnectionState, ConnectionSupervisor, GatewayConfig, ProtocolStateMachine, SessionState,
};
use ember_transport::{AuthScheme, HttpControlPlane, WsConnector};

use crate::api::KookApi;
use crate::bot::{BotIdentity, KookBot};
use crate::config::KookConfig;
use crate::normalize::KookNormalizer;

/// One KOOK bot account with its supervised gateway connection.
pub struct KookAdapter {
    config: KookConfig,
    identity: Arc<BotIdentity>,
    api: KookApi,
    bot: Arc<KookBot>,
    supervisor: ConnectionSupervisor,
}

impl KookAdapter {
    /// Creates an adapter talking to the real KOOK endpoints.
    pub fn new(config: KookConfig, gateway: GatewayConfig) -> ControlPlaneResult<Self> {
        let plane = HttpControlPlane::new(config.base_url.as_str())?
            .with_token(AuthScheme::Bot, config.token.as_str());
        Ok(Self::with_collaborators(
            config,
            Arc::new(plane),
            Arc::new(WsConnector::new()),
            gateway,
        ))
    }

    /// Creates an adapter over the given control plane and connector.
    pub fn with_collaborators(
        config: KookConfig,
        plane: BoxedControlPlane,
        connector: BoxedConnector,
        gateway: GatewayConfig,
    ) -> Self {
        let identity = BotIdentity::new(config.id.as_str());
        let api = KookApi::new(plane);
        let machine = ProtocolStateMachine::new(
            config.id.as_str(),
            connector,
            Arc::new(api.clone()),
            Arc::new(KookNormalizer::new(identity.clone())),
            gateway,
        );
        let bot = Arc::new(KookBot::new(identity.clone(), api.clone()));

        Self {
            config,
            identity,
            api,
            bot,
            supervisor: ConnectionSupervisor::new(machine),
        }
    }

    pub fn config(&self) -> &KookConfig {
        &self.config
    }

    pub fn api(&self) -> &KookApi {
        &self.api
    }

    pub fn identity(&self) -> &Arc<BotIdentity> {
        &self.identity
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn session(&self) -> SessionState {
        self.supervisor.session()
    }

    /// Asks `/user/me` for the account id and records it.
    pub async fn identify(&self) -> ControlPlaneResult<String> {
        let me = self.api.me().await?;
        self.identity.resolve(me.id.as_str());
        info!(
            configured = %self.config.id,
            bot_id = %self.identity.id(),
            username = %me.username,
            "KOOK account identified"
        );
        Ok(self.identity.id().to_string())
    }
}

#[async_trait]
impl Adapter for KookAdapter {
    fn name(&self) -> &str {
        "kook"
    }

    fn bot(&self) -> BoxedBot {
        self.bot.clone()
    }

    async fn connect(&self, handler: BoxedInboundHandler) -> GatewayResult<()> {
        if !self.identity.is_resolved() {
            if let Err(e) = self.identify().await {
                warn!(bot_id = %self.config.id, error = %e, "Failed to identify account, using configured id");
            }
        }
        self.supervisor.connect(handler).await
    }

    async fn close(&self) {
        info!(bot_id = %self.identity.id(), "Closing KOOK adapter");
        self.supervisor.close().await;
    }
}
