use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use ember_core::{Bot, ControlPlaneError, ControlPlaneResult, NormalizedMessage, Reply, Target};

/// Records every reply instead of sending it.
#[derive(Default)]
pub struct MockBot {
    sent: Mutex<Vec<(String, Reply)>>,
    failing: AtomicBool,
}

impl MockBot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A bot whose sends are rejected by the backend.
    pub fn failing() -> Arc<Self> {
        let bot = Self::default();
        bot.failing.store(true, Ordering::SeqCst);
        Arc::new(bot)
    }

    /// Texts of sent replies.
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, r)| r.text.clone()).collect()
    }

    pub fn sent(&self) -> Vec<(String, Reply)> {
        self.sent.lock().clone()
    }
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
        message: &NormalizedMessage,
        reply: &Reply,
    ) -> ControlPlaneResult<Option<String>> {
        self.send_to(&Target::reply_to(message), reply).await
    }

    async fn send_to(&self, target: &Target, reply: &Reply) -> ControlPlaneResult<Option<String>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ControlPlaneError::Api {
                code: 40000,
                message: "rejected".into(),
            });
        }
        let mut sent = self.sent.lock();
        sent.push((target.id().to_string(), reply.clone()));
        Ok(Some(format!("sent-{}", sent.len())))
    }

    async fn recall(&self, _message_id: &str) -> ControlPlaneResult<()> {
        Ok(())
    }
}

pub fn message(text: &str) -> NormalizedMessage {
    NormalizedMessage::new("10000", "42", text)
        .with_platform("mock")
        .with_message_id("m1")
        .with_channel("c1", "g1")
}
