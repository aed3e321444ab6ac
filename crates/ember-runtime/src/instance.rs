//! One bot account bound to its handlers.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use ember_core::{BoxedAdapter, BoxedInboundHandler, GatewayResult};
use ember_framework::{Dispatcher, HandlerRegistry};

use crate::error::{RuntimeError, RuntimeResult};

/// An adapter together with the registry its traffic is dispatched to.
///
/// Derefs to [`HandlerRegistry`], so handlers and plugins are registered
/// directly on the instance:
///
/// ```rust,ignore
/// instance.on_message(HandlerSpec::builder().keywords(["ping"]).handler(pong));
/// instance.start()?;
/// ```
pub struct BotInstance {
    id: String,
    registry: Arc<HandlerRegistry>,
    adapter: BoxedAdapter,
    task: Mutex<Option<JoinHandle<GatewayResult<()>>>>,
}

impl BotInstance {
    pub fn new(id: impl Into<String>, adapter: BoxedAdapter) -> Self {
        Self::with_registry(id, adapter, Arc::new(HandlerRegistry::new()))
    }

    /// Creates an instance dispatching into `registry`, which may be shared
    /// with other instances.
    pub fn with_registry(
        id: impl Into<String>,
        adapter: BoxedAdapter,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            id: id.into(),
            registry,
            adapter,
            task: Mutex::new(None),
        }
    }

    /// The configured bot id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn adapter(&self) -> &BoxedAdapter {
        &self.adapter
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.registry.clone())
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Spawns the adapter's supervised connection.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> RuntimeResult<()> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(RuntimeError::AlreadyRunning(self.id.clone()));
        }

        let adapter = self.adapter.clone();
        let handler: BoxedInboundHandler = Arc::new(self.dispatcher().bind(adapter.bot()));
        let span = info_span!("bot", bot_id = %self.id, adapter = adapter.name());
        *task = Some(tokio::spawn(
            async move { adapter.connect(handler).await }.instrument(span),
        ));

        info!(bot_id = %self.id, adapter = self.adapter.name(), "Bot started");
        Ok(())
    }

    /// Closes the adapter and waits for its connection task to finish.
    pub async fn close(&self) {
        self.adapter.close().await;

        let Some(task) = self.task.lock().take() else {
            return;
        };
        match task.await {
            Ok(Ok(())) => info!(bot_id = %self.id, "Bot stopped"),
            Ok(Err(e)) => warn!(bot_id = %self.id, error = %e, "Bot stopped with error"),
            Err(e) => error!(bot_id = %self.id, error = %e, "Bot task panicked"),
        }
    }
}

impl Deref for BotInstance {
    type Target = HandlerRegistry;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

impl std::fmt::Debug for BotInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotInstance")
            .field("id", &self.id)
            .field("adapter", &self.adapter.name())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use ember_framework::{HandlerSpec, MessageContext};

    use super::*;
    use crate::test_support::{MockAdapter, message};

    #[tokio::test]
    async fn dispatches_adapter_traffic_to_registered_handlers() {
        let (adapter, mut replies) = MockAdapter::new(vec![message("ping")]);
        let instance = BotInstance::new("10000", adapter.clone());
        instance.on_message(
            HandlerSpec::builder()
                .keywords(["ping"])
                .handler(|_ctx: MessageContext| async { "pong" }),
        );

        instance.start().unwrap();
        let reply = timeout(Duration::from_secs(5), replies.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, "pong");
        assert!(instance.is_running());

        instance.close().await;
        assert!(!instance.is_running());
        assert_eq!(adapter.connects(), 1);
    }

    #[tokio::test]
    async fn refuses_to_start_twice() {
        let (adapter, _replies) = MockAdapter::new(Vec::new());
        let instance = BotInstance::new("10000", adapter);

        instance.start().unwrap();
        assert!(matches!(
            instance.start(),
            Err(RuntimeError::AlreadyRunning(id)) if id == "10000"
        ));

        instance.close().await;
        instance.start().unwrap();
        instance.close().await;
    }

    #[tokio::test]
    async fn close_without_start_is_a_no_op() {
        let (adapter, _replies) = MockAdapter::new(Vec::new());
        let instance = BotInstance::new("10000", adapter.clone());
        instance.close().await;
        assert_eq!(adapter.connects(), 0);
    }

    #[tokio::test]
    async fn shared_registry_serves_every_instance() {
        let registry = Arc::new(HandlerRegistry::new());
        registry.on_message(HandlerSpec::builder().handler(|ctx: MessageContext| async move {
            ctx.text().to_uppercase()
        }));
        let (first, mut first_replies) = MockAdapter::new(vec![message("a")]);
        let (second, mut second_replies) = MockAdapter::new(vec![message("b")]);
        let a = BotInstance::with_registry("1", first, registry.clone());
        let b = BotInstance::with_registry("2", second, registry);

        a.start().unwrap();
        b.start().unwrap();
        assert_eq!(first_replies.recv().await.unwrap(), "A");
        assert_eq!(second_replies.recv().await.unwrap(), "B");
        a.close().await;
        b.close().await;
    }
}
