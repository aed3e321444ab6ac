use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;

use ember_core::{
    BoxedTransport, Connector, ControlPlane, ControlPlaneResult, Inbound, InboundHandler,
    Transport, TransportError, TransportResult, check_response,
};

/// Control plane answering from canned responses and recording requests.
///
/// GET requests are recorded with their query as a JSON object; POST
/// requests with their body. Paths without a canned response answer
/// `{"code": 0, "data": {}}`.
#[derive(Default)]
pub struct MockControlPlane {
    responses: Mutex<HashMap<String, Value>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl MockControlPlane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, body: Value) {
        self.responses.lock().insert(path.to_string(), body);
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().clone()
    }

    fn answer(&self, path: &str, recorded: Value) -> ControlPlaneResult<Value> {
        self.requests.lock().push((path.to_string(), recorded));
        let body = self
            .responses
            .lock()
            .get(path)
            .cloned()
            .unwrap_or_else(|| json!({"code": 0, "data": {}}));
        check_response(body)
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> ControlPlaneResult<Value> {
        let query: Map<String, Value> = query
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
            .collect();
        self.answer(path, Value::Object(query))
    }

    async fn post(&self, path: &str, body: Value) -> ControlPlaneResult<Value> {
        self.answer(path, body)
    }
}

/// Transport fed by an unbounded channel.
pub struct ChannelTransport {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl ChannelTransport {
    pub fn pair() -> (mpsc::UnboundedSender<String>, Arc<Self>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            inbound: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        (tx, transport)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, data: String) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::closed("closed"));
        }
        self.sent.lock().push(data);
        Ok(())
    }

    async fn recv(&self) -> TransportResult<Option<String>> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one prepared transport, then refuses.
pub struct OnceConnector {
    transport: Mutex<Option<Arc<ChannelTransport>>>,
}

impl OnceConnector {
    pub fn new(transport: Arc<ChannelTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport: Mutex::new(Some(transport)),
        })
    }
}

#[async_trait]
impl Connector for OnceConnector {
    async fn connect(&self, url: &str) -> TransportResult<BoxedTransport> {
        match self.transport.lock().take() {
            Some(transport) => Ok(transport),
            None => Err(TransportError::ConnectionFailed {
                url: url.to_string(),
                reason: "no transport left".into(),
            }),
        }
    }
}

/// Forwards every inbound item to a channel.
pub struct RecordingHandler {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl RecordingHandler {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl InboundHandler for RecordingHandler {
    async fn handle(&self, inbound: Inbound) {
        let _ = self.tx.send(inbound);
    }
}
