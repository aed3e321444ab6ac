use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

use ember_core::{
    Adapter, Bot, BoxedBot, BoxedInboundHandler, ControlPlaneResult, GatewayResult, Inbound,
    NormalizedMessage, Reply, Target,
};

/// Forwards reply texts to a channel.
pub struct MockBot {
    replies: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Bot for MockBot {
    fn id(&self) -> &str {
        "10000"
    }

    fn platform(&self) -> &str {
        "mock"
    }

    async fn send(
        &self,
        _message: &NormalizedMessage,
        reply: &Reply,
    ) -> ControlPlaneResult<Option<String>> {
        let _ = self.replies.send(reply.text.clone());
        Ok(None)
    }

    async fn send_to(&self, _target: &Target, reply: &Reply) -> ControlPlaneResult<Option<String>> {
        let _ = self.replies.send(reply.text.clone());
        Ok(None)
    }

    async fn recall(&self, _message_id: &str) -> ControlPlaneResult<()> {
        Ok(())
    }
}

/// Delivers queued inbound items on connect, then idles until closed.
pub struct MockAdapter {
    bot: Arc<MockBot>,
    queued: Mutex<Vec<Inbound>>,
    closed: Notify,
    connects: AtomicUsize,
}

impl MockAdapter {
    pub fn new(queued: Vec<Inbound>) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (replies, rx) = mpsc::unbounded_channel();
        let adapter = Arc::new(Self {
            bot: Arc::new(MockBot { replies }),
            queued: Mutex::new(queued),
            closed: Notify::new(),
            connects: AtomicUsize::new(0),
        });
        (adapter, rx)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    fn bot(&self) -> BoxedBot {
        self.bot.clone()
    }

    async fn connect(&self, handler: BoxedInboundHandler) -> GatewayResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let queued = std::mem::take(&mut *self.queued.lock());
        for inbound in queued {
            handler.handle(inbound).await;
        }
        self.closed.notified().await;
        Ok(())
    }

    async fn close(&self) {
        self.closed.notify_one();
    }
}

pub fn message(text: &str) -> Inbound {
    NormalizedMessage::new("10000", "42", text)
        .with_platform("mock")
        .with_channel("c1", "g1")
        .into()
}
