//! WebSocket connector.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace};

use ember_core::{BoxedTransport, Connector, Transport, TransportError, TransportResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Opens [`WsTransport`]s with `connect_async`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> TransportResult<BoxedTransport> {
        info!(url = %url, "Connecting to WebSocket server");

        let (stream, _response) =
            connect_async(url)
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    url: url.to_string(),
                    reason: format!("WebSocket connection failed: {e}"),
                })?;

        debug!(url = %url, "WebSocket connected");
        Ok(Arc::new(WsTransport::new(url, stream)))
    }
}

/// One WebSocket connection carrying text frames.
///
/// The sink and the source are locked separately, so a heartbeat `send`
/// never waits behind a pending `recv`.
pub struct WsTransport {
    url: String,
    sink: Mutex<WsSink>,
    source: Mutex<WsSource>,
    closed: AtomicBool,
}

impl WsTransport {
    fn new(url: &str, stream: WsStream) -> Self {
        let (sink, source) = stream.split();
        Self {
            url: url.to_string(),
            sink: Mutex::new(sink),
            source: Mutex::new(source),
            closed: AtomicBool::new(false),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, data: String) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::closed("transport closed"));
        }
        trace!(url = %self.url, len = data.len(), "Sending text");
        self.sink
            .lock()
            .await
            .send(Message::text(data))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> TransportResult<Option<String>> {
        let mut source = self.source.lock().await;
        loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(url = %self.url, len = text.len(), "Received text");
                    return Ok(Some(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    trace!(url = %self.url, len = data.len(), "Received binary");
                    return String::from_utf8(data.to_vec())
                        .map(Some)
                        .map_err(|e| TransportError::Io(format!("non UTF-8 binary frame: {e}")));
                }
                Some(Ok(Message::Ping(data))) => {
                    trace!(url = %self.url, "Received ping, sending pong");
                    let _ = self.sink.lock().await.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    info!(url = %self.url, frame = ?frame, "Server closed connection");
                    self.closed.store(true, Ordering::Release);
                    return Ok(None);
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    debug!(url = %self.url, "WebSocket stream ended");
                    self.closed.store(true, Ordering::Release);
                    return Ok(None);
                }
                Some(Err(e)) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.sink.lock().await.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use super::*;

    #[tokio::test]
    async fn exchanges_text_and_reports_close_as_end_of_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::text("hello")).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    ws.send(Message::text(format!("echo:{}", text.as_str())))
                        .await
                        .unwrap();
                    break;
                }
            }
            ws.close(None).await.unwrap();
        });

        let transport = WsConnector::new()
            .connect(&format!("ws://{addr}"))
            .await
            .unwrap();

        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("hello"));
        transport.send("hi".to_string()).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("echo:hi"));
        assert_eq!(transport.recv().await.unwrap(), None);

        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(transport.send("late".to_string()).await.is_err());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_server_is_connection_failed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = WsConnector::new()
            .connect(&format!("ws://{addr}"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::ConnectionFailed { .. }));
    }
}
