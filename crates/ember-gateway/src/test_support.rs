//! Channel-backed mocks shared by the gateway tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};

use ember_core::{
    BoxedTransport, Connector, ControlPlaneResult, Inbound, InboundHandler, NormalizeError,
    NormalizedMessage, Transport, TransportError, TransportResult,
};

use crate::normalizer::{GatewayLocator, Normalizer};

pub(crate) fn hello(code: i64, session_id: &str) -> String {
    json!({"s": 1, "d": {"code": code, "session_id": session_id}}).to_string()
}

pub(crate) fn event(sn: u64, text: &str) -> String {
    json!({"s": 0, "d": {"text": text}, "sn": sn}).to_string()
}

pub(crate) struct MockTransport {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    sent: Mutex<Vec<String>>,
    closes: AtomicUsize,
    auto_pong: AtomicBool,
    pending_pongs: AtomicUsize,
    pong_ready: Notify,
}

impl MockTransport {
    /// The returned sender feeds `recv`; dropping it ends the stream.
    pub(crate) fn pair() -> (mpsc::UnboundedSender<String>, Arc<Self>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            inbound: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            auto_pong: AtomicBool::new(false),
            pending_pongs: AtomicUsize::new(0),
            pong_ready: Notify::new(),
        });
        (tx, transport)
    }

    /// Answers every heartbeat with an ack.
    pub(crate) fn auto_pong(&self, enabled: bool) {
        self.auto_pong.store(enabled, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, data: String) -> TransportResult<()> {
        if self.closes() > 0 {
            return Err(TransportError::SendFailed("closed".into()));
        }
        let is_ping = data.contains(r#""s":2"#);
        self.sent.lock().push(data);
        if is_ping && self.auto_pong.load(Ordering::SeqCst) {
            self.pending_pongs.fetch_add(1, Ordering::SeqCst);
            self.pong_ready.notify_one();
        }
        Ok(())
    }

    async fn recv(&self) -> TransportResult<Option<String>> {
        loop {
            if self
                .pending_pongs
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(Some(json!({"s": 3}).to_string()));
            }
            let mut rx = self.inbound.lock().await;
            tokio::select! {
                next = rx.recv() => return Ok(next),
                _ = self.pong_ready.notified() => {}
            }
        }
    }

    async fn close(&self) -> TransportResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct MockConnector {
    transports: Mutex<VecDeque<Arc<MockTransport>>>,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub(crate) fn with(transports: Vec<Arc<MockTransport>>) -> Arc<Self> {
        Arc::new(Self {
            transports: Mutex::new(transports.into()),
            attempts: AtomicUsize::new(0),
        })
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> TransportResult<BoxedTransport> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.transports.lock().pop_front();
        match next {
            Some(transport) => Ok(transport),
            None => Err(TransportError::ConnectionFailed {
                url: url.to_string(),
                reason: "no more transports".into(),
            }),
        }
    }
}

pub(crate) struct MockLocator {
    url: String,
    calls: AtomicUsize,
}

impl MockLocator {
    pub(crate) fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            url: url.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GatewayLocator for MockLocator {
    async fn gateway_url(&self) -> ControlPlaneResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.url.clone())
    }
}

/// Turns `{"text": ...}` payloads into messages.
pub(crate) struct TextNormalizer;

impl Normalizer for TextNormalizer {
    fn normalize(&self, payload: &Value) -> Result<Option<Inbound>, NormalizeError> {
        let text = payload
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| NormalizeError::new("missing text"))?;
        Ok(Some(NormalizedMessage::new("bot1", "user", text).into()))
    }
}

/// Forwards the text of every handled message to a channel.
pub(crate) struct RecordingHandler {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl RecordingHandler {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx: Some(tx) }), rx)
    }

    /// A handler that never finishes.
    pub(crate) fn stalled() -> Arc<Self> {
        Arc::new(Self { tx: None })
    }
}

#[async_trait]
impl InboundHandler for RecordingHandler {
    async fn handle(&self, inbound: Inbound) {
        match (&self.tx, inbound) {
            (Some(tx), Inbound::Message(message)) => {
                let _ = tx.send(message.text().to_string());
            }
            (None, _) => std::future::pending::<()>().await,
            _ => {}
        }
    }
}
