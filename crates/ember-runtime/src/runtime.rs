//! Runtime orchestration.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ember_runtime::EmberRuntime;
//!
//! // Loads ember.toml from the current directory and EMBER_* variables
//! let runtime = EmberRuntime::builder().build()?;
//! for instance in runtime.instances() {
//!     instance.on_message(HandlerSpec::builder().keywords(["ping"]).handler(pong));
//! }
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use tokio::signal;
use tracing::{debug, info, warn};

use ember_adapter_kook::{KookAdapter, KookConfig};
use ember_core::BoxedAdapter;
use ember_framework::HandlerRegistry;
use ember_gateway::GatewayConfig;

use crate::config::{BotConfig, ConfigError, ConfigLoader, EmberConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::instance::BotInstance;
use crate::logging;

/// Owns every configured bot and runs them until shutdown.
pub struct EmberRuntime {
    config: EmberConfig,
    instances: RwLock<Vec<Arc<BotInstance>>>,
}

impl EmberRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Initializes logging, then builds one instance with its own registry
    /// per enabled bot.
    pub fn from_config(config: EmberConfig) -> RuntimeResult<Self> {
        Self::build(config, None)
    }

    fn build(config: EmberConfig, shared: Option<Arc<HandlerRegistry>>) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);
        validate_config(&config)?;

        let gateway = config.gateway.to_gateway_config();
        let mut instances = Vec::new();
        for bot in config.enabled_bots() {
            let adapter = build_adapter(bot, gateway.clone())?;
            let instance = match &shared {
                Some(registry) => BotInstance::with_registry(&bot.id, adapter, registry.clone()),
                None => BotInstance::new(&bot.id, adapter),
            };
            debug!(bot_id = %bot.id, adapter = %bot.adapter, "Bot instance created");
            instances.push(Arc::new(instance));
        }

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            bots = instances.len(),
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config,
            instances: RwLock::new(instances),
        })
    }

    pub fn config(&self) -> &EmberConfig {
        &self.config
    }

    /// Snapshot of the instances in registration order.
    pub fn instances(&self) -> Vec<Arc<BotInstance>> {
        self.instances.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<BotInstance>> {
        self.instances.read().iter().find(|i| i.id() == id).cloned()
    }

    pub fn instance(&self, id: &str) -> RuntimeResult<Arc<BotInstance>> {
        self.get(id)
            .ok_or_else(|| RuntimeError::BotNotFound(id.to_string()))
    }

    /// Adds an instance built outside the configuration.
    pub fn add_instance(&self, instance: BotInstance) -> RuntimeResult<Arc<BotInstance>> {
        let mut instances = self.instances.write();
        if instances.iter().any(|i| i.id() == instance.id()) {
            return Err(RuntimeError::BotExists(instance.id().to_string()));
        }
        let instance = Arc::new(instance);
        instances.push(instance.clone());
        info!(bot_id = %instance.id(), adapter = instance.adapter().name(), "Bot instance added");
        Ok(instance)
    }

    /// Closes and removes an instance.
    pub async fn remove_instance(&self, id: &str) -> RuntimeResult<()> {
        let instance = {
            let mut instances = self.instances.write();
            let index = instances
                .iter()
                .position(|i| i.id() == id)
                .ok_or_else(|| RuntimeError::BotNotFound(id.to_string()))?;
            instances.remove(index)
        };
        instance.close().await;
        Ok(())
    }

    /// Starts every instance that is not already running.
    pub fn start(&self) {
        for instance in self.instances() {
            match instance.start() {
                Ok(()) => {}
                Err(RuntimeError::AlreadyRunning(id)) => {
                    debug!(bot_id = %id, "Bot already running");
                }
                Err(e) => warn!(bot_id = %instance.id(), error = %e, "Failed to start bot"),
            }
        }
    }

    /// Closes every instance concurrently.
    pub async fn stop(&self) {
        info!("Stopping Ember runtime");
        join_all(self.instances().iter().map(|i| i.close())).await;
        info!("Runtime stopped");
    }

    /// Runs until Ctrl+C (or SIGTERM on unix).
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        if self.instances.read().is_empty() {
            warn!("No bots configured");
        }
        self.start();
        info!("Ember runtime is now running");

        shutdown.await;

        self.stop().await;
        Ok(())
    }
}

impl std::fmt::Debug for EmberRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmberRuntime")
            .field("instances", &*self.instances.read())
            .finish_non_exhaustive()
    }
}

fn build_adapter(bot: &BotConfig, gateway: GatewayConfig) -> RuntimeResult<BoxedAdapter> {
    match bot.adapter.as_str() {
        "kook" => {
            let mut config = KookConfig::new(&bot.id, &bot.token);
            if let Some(base_url) = &bot.base_url {
                config = config.with_base_url(base_url);
            }
            let adapter =
                KookAdapter::new(config, gateway).map_err(|source| RuntimeError::AdapterSetup {
                    bot_id: bot.id.clone(),
                    source,
                })?;
            Ok(Arc::new(adapter))
        }
        other => Err(ConfigError::InvalidAdapterType(other.to_string()).into()),
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Cannot listen for SIGTERM"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => warn!(error = %e, "Cannot listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder loading the configuration before creating an [`EmberRuntime`].
///
/// ```rust,ignore
/// let runtime = EmberRuntime::builder()
///     .config_file("config/production.toml")
///     .profile("production")
///     .registry(registry)
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    registry: Option<Arc<HandlerRegistry>>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            registry: None,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: EmberConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Dispatches every bot into `registry` instead of one registry per bot.
    pub fn registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> RuntimeResult<EmberRuntime> {
        let config = self.config_loader.load()?;
        EmberRuntime::build(config, self.registry)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use ember_framework::{HandlerSpec, MessageContext};

    use super::*;
    use crate::test_support::{MockAdapter, message};

    fn kook_config(ids: &[&str]) -> EmberConfig {
        EmberConfig {
            bots: ids.iter().map(|id| BotConfig::new(*id, "token")).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn builds_one_instance_per_enabled_bot() {
        let mut config = kook_config(&["1", "2", "3"]);
        config.bots[1].enabled = false;

        let runtime = EmberRuntime::from_config(config).unwrap();
        let ids: Vec<_> = runtime.instances().iter().map(|i| i.id().to_string()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(runtime.instance("1").unwrap().adapter().name(), "kook");
        assert!(matches!(
            runtime.instance("2"),
            Err(RuntimeError::BotNotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_configuration_is_rejected() {
        let err = EmberRuntime::from_config(kook_config(&["1", "1"])).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Config(ConfigError::DuplicateBotId(_))
        ));
    }

    #[tokio::test]
    async fn shared_registry_is_used_by_every_instance() {
        let registry = Arc::new(HandlerRegistry::new());
        let runtime = EmberRuntime::build(kook_config(&["1", "2"]), Some(registry.clone())).unwrap();
        for instance in runtime.instances() {
            assert!(Arc::ptr_eq(instance.registry(), &registry));
        }
    }

    #[tokio::test]
    async fn duplicate_instances_are_rejected() {
        let runtime = EmberRuntime::from_config(kook_config(&["1"])).unwrap();
        let (adapter, _replies) = MockAdapter::new(Vec::new());
        let err = runtime
            .add_instance(BotInstance::new("1", adapter))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::BotExists(id) if id == "1"));
    }

    #[tokio::test]
    async fn run_until_starts_and_stops_every_instance() {
        let runtime = EmberRuntime::from_config(EmberConfig::default()).unwrap();
        let (adapter, mut replies) = MockAdapter::new(vec![message("hello")]);
        let instance = runtime
            .add_instance(BotInstance::new("10000", adapter.clone()))
            .unwrap();
        instance.on_message(
            HandlerSpec::builder().handler(|ctx: MessageContext| async move {
                format!("echo {}", ctx.text())
            }),
        );

        runtime
            .run_until(async {
                let reply = timeout(Duration::from_secs(5), replies.recv())
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(reply, "echo hello");
            })
            .await
            .unwrap();

        assert!(!instance.is_running());
        assert_eq!(adapter.connects(), 1);
    }

    #[tokio::test]
    async fn remove_instance_closes_it() {
        let runtime = EmberRuntime::from_config(EmberConfig::default()).unwrap();
        let (adapter, _replies) = MockAdapter::new(Vec::new());
        let instance = runtime.add_instance(BotInstance::new("7", adapter)).unwrap();
        runtime.start();
        assert!(instance.is_running());

        runtime.remove_instance("7").await.unwrap();
        assert!(!instance.is_running());
        assert!(runtime.get("7").is_none());
        assert!(matches!(
            runtime.remove_instance("7").await,
            Err(RuntimeError::BotNotFound(_))
        ));
    }
}
