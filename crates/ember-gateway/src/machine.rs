//! Gateway protocol state machine.
//!
//! One [`ProtocolStateMachine`] serves one bot account. Each call to
//! [`run_once`](ProtocolStateMachine::run_once) performs a single connection
//! attempt:
//!
//! ```text
//! DISCONNECTED ─connect─▶ HANDSHAKING ─hello ok─▶ ACTIVE ◀─resume ack─ RESUMING
//!                              │                     │                    ▲
//!                              └─hello reject──▶ DISCONNECTED ◀───────────┤
//!                                                    ▲   (hello ok with a cached sequence)
//!                              reconnect / heartbeat timeout / I/O error
//! ```
//!
//! The receive loop tracks sequence numbers synchronously and never waits on
//! handlers. Data frames go into a bounded per-connection queue that a feeder
//! task drains into the [`WorkerPool`]; when the queue is full the frame is
//! dropped, so acks and reconnect requests are read even while every worker
//! is busy. The heartbeat loop and its watchdogs run as separate tasks tied
//! to the connection's cancellation token.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use ember_core::{
    BoxedConnector, BoxedInboundHandler, BoxedTransport, GatewayError, GatewayResult,
    TransportError,
};

use crate::config::GatewayConfig;
use crate::frame::{Frame, FrameKind};
use crate::normalizer::{GatewayLocator, Normalizer};
use crate::pool::WorkerPool;
use crate::session::{ConnectionState, Observed, SessionState};

// =============================================================================
// Live connection
// =============================================================================

/// Everything scoped to one open transport.
struct Connection {
    transport: BoxedTransport,
    cancel: CancellationToken,
    /// Set by a heartbeat ack, cleared by the watchdog that observes it.
    ack: watch::Sender<bool>,
    /// First reason the connection was shut down from outside the receive loop.
    reason: Mutex<Option<GatewayError>>,
}

impl Connection {
    fn new(transport: BoxedTransport) -> Self {
        let (ack, _) = watch::channel(false);
        Self {
            transport,
            cancel: CancellationToken::new(),
            ack,
            reason: Mutex::new(None),
        }
    }

    /// Records `reason` (first one wins) and stops the receive loop.
    ///
    /// Returns `true` only for the call that actually shut the connection down.
    fn shutdown(&self, reason: GatewayError) -> bool {
        {
            let mut slot = self.reason.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason);
        }
        self.cancel.cancel();
        true
    }

    fn take_reason(&self) -> GatewayError {
        self.reason.lock().take().unwrap_or(GatewayError::Closed)
    }
}

/// Tears a connection down when `run_once` ends, including when its future
/// is dropped before finishing.
struct ConnectionGuard<'a> {
    machine: &'a ProtocolStateMachine,
    conn: Arc<Connection>,
    closed: bool,
}

impl ConnectionGuard<'_> {
    async fn finish(mut self) {
        self.conn.cancel.cancel();
        self.machine.forget(&self.conn);
        if let Err(e) = self.conn.transport.close().await {
            debug!(bot_id = %self.machine.bot_id, error = %e, "Error while closing transport");
        }
        self.closed = true;
        self.machine.set_state(ConnectionState::Disconnected);
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.conn.cancel.cancel();
        self.machine.forget(&self.conn);
        self.machine.set_state(ConnectionState::Disconnected);

        // No await in drop; close on the runtime if there still is one.
        let transport = self.conn.transport.clone();
        let bot_id = self.machine.bot_id.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = transport.close().await {
                    debug!(bot_id = %bot_id, error = %e, "Error while closing transport");
                }
            });
        }
    }
}

/// A data frame waiting for a worker slot.
struct Queued {
    sn: Option<u64>,
    payload: Value,
}

// =============================================================================
// State machine
// =============================================================================

/// Session lifecycle for one bot account.
pub struct ProtocolStateMachine {
    bot_id: String,
    connector: BoxedConnector,
    locator: Arc<dyn GatewayLocator>,
    normalizer: Arc<dyn Normalizer>,
    config: GatewayConfig,
    pool: WorkerPool,
    session: Arc<Mutex<SessionState>>,
    state: watch::Sender<ConnectionState>,
    current: Mutex<Option<Arc<Connection>>>,
}

impl ProtocolStateMachine {
    pub fn new(
        bot_id: impl Into<String>,
        connector: BoxedConnector,
        locator: Arc<dyn GatewayLocator>,
        normalizer: Arc<dyn Normalizer>,
        config: GatewayConfig,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            bot_id: bot_id.into(),
            connector,
            locator,
            normalizer,
            pool: WorkerPool::new(config.max_in_flight),
            config,
            session: Arc::new(Mutex::new(SessionState::default())),
            state,
            current: Mutex::new(None),
        }
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribes to connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Worker pool shared by every connection of this machine.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Snapshot of the session bookkeeping.
    pub fn session(&self) -> SessionState {
        self.session.lock().clone()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(bot_id = %self.bot_id, from = %previous, to = %state, "Connection state changed");
        }
    }

    /// Performs one connection attempt and returns when it ends.
    ///
    /// The transport is closed and the heartbeat cancelled on every exit path,
    /// including when the returned future is dropped. Frames already queued
    /// when the connection ends are still handed to the pool.
    pub async fn run_once(&self, handler: BoxedInboundHandler) -> GatewayResult<()> {
        let url = self.resolve_gateway_url().await?;

        info!(bot_id = %self.bot_id, url = %url, "Connecting to gateway");
        let transport = self.connector.connect(&url).await?;
        let conn = Arc::new(Connection::new(transport));
        *self.current.lock() = Some(conn.clone());
        self.set_state(ConnectionState::Handshaking);
        let guard = ConnectionGuard {
            machine: self,
            conn: conn.clone(),
            closed: false,
        };

        let (queue, pending) = mpsc::channel(self.config.queue_capacity.max(1));
        tokio::spawn(feed_pool(
            pending,
            self.pool.clone(),
            self.normalizer.clone(),
            handler,
            self.bot_id.clone(),
        ));

        let result = self.receive_loop(&conn, &queue).await;
        guard.finish().await;

        result
    }

    fn forget(&self, conn: &Arc<Connection>) {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, conn)) {
            current.take();
        }
    }

    /// Force-closes the live connection, if any.
    pub async fn close(&self) {
        let conn = self.current.lock().clone();
        if let Some(conn) = conn {
            conn.shutdown(GatewayError::Closed);
            if let Err(e) = conn.transport.close().await {
                debug!(bot_id = %self.bot_id, error = %e, "Error while closing transport");
            }
        }
    }

    async fn resolve_gateway_url(&self) -> GatewayResult<String> {
        let cached = self.session.lock().gateway_url.clone();
        if let Some(url) = cached {
            return Ok(url);
        }
        let url = self.locator.gateway_url().await?;
        debug!(bot_id = %self.bot_id, url = %url, "Discovered gateway endpoint");
        self.session.lock().gateway_url = Some(url.clone());
        Ok(url)
    }

    async fn receive_loop(
        &self,
        conn: &Arc<Connection>,
        queue: &mpsc::Sender<Queued>,
    ) -> GatewayResult<()> {
        loop {
            let next = tokio::select! {
                biased;
                _ = conn.cancel.cancelled() => return Err(conn.take_reason()),
                next = conn.transport.recv() => next?,
            };

            let Some(text) = next else {
                info!(bot_id = %self.bot_id, "Gateway closed the connection");
                return Err(TransportError::closed("stream ended").into());
            };

            let frame = match Frame::decode(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(bot_id = %self.bot_id, error = %e, "Skipping malformed frame");
                    continue;
                }
            };
            trace!(bot_id = %self.bot_id, kind = frame.kind.as_str(), sn = ?frame.sn, "Received frame");

            if let Some(sn) = frame.sn {
                self.observe_sequence(sn);
            }

            match frame.kind {
                FrameKind::Event => self.enqueue_event(queue, frame),
                FrameKind::Hello => self.on_hello(conn, &frame).await?,
                FrameKind::Pong => {
                    trace!(bot_id = %self.bot_id, "Heartbeat acknowledged");
                    conn.ack.send_replace(true);
                }
                FrameKind::Reconnect => {
                    info!(bot_id = %self.bot_id, "Gateway requested a fresh session");
                    self.session.lock().reset();
                    self.set_state(ConnectionState::Reconnecting);
                    return Err(GatewayError::ReconnectRequested);
                }
                FrameKind::ResumeAck => {
                    if let Some(session_id) = frame.session_id() {
                        self.session.lock().session_id = Some(session_id.to_string());
                    }
                    info!(bot_id = %self.bot_id, "Resume done");
                    self.set_state(ConnectionState::Active);
                }
                FrameKind::Ping | FrameKind::Resume => {
                    trace!(bot_id = %self.bot_id, kind = frame.kind.as_str(), "Ignoring client-bound frame");
                }
            }
        }
    }

    fn observe_sequence(&self, sn: u64) {
        let observed = self.session.lock().observe(sn);
        if let Observed::Stale { last } = observed {
            debug!(bot_id = %self.bot_id, sn, last, "Received sequence lower than last seen");
        }
    }

    fn enqueue_event(&self, queue: &mpsc::Sender<Queued>, frame: Frame) {
        let sn = frame.sn;
        match queue.try_send(Queued { sn, payload: frame.d }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(bot_id = %self.bot_id, sn = ?sn, in_flight = self.pool.in_flight(), "Inbound queue full, dropping frame");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(bot_id = %self.bot_id, sn = ?sn, "Worker pool closed, dropping frame");
            }
        }
    }

    async fn on_hello(&self, conn: &Arc<Connection>, frame: &Frame) -> GatewayResult<()> {
        let code = frame.code();
        if code != 0 {
            warn!(bot_id = %self.bot_id, code, "Handshake rejected");
            self.session.lock().reset();
            return Err(GatewayError::HandshakeRejected { code });
        }

        let (resume_from, session_id) = {
            let mut session = self.session.lock();
            let resume_from = if session.can_resume() {
                session.last_sequence
            } else {
                None
            };
            if let Some(session_id) = frame.session_id() {
                session.session_id = Some(session_id.to_string());
            }
            (resume_from, session.session_id.clone())
        };

        match resume_from {
            Some(sn) => {
                info!(bot_id = %self.bot_id, sn, "Handshake done, resuming session");
                conn.transport.send(Frame::resume(Some(sn)).encode()).await?;
                self.set_state(ConnectionState::Resuming);
            }
            None => {
                info!(bot_id = %self.bot_id, session_id = ?session_id, "Handshake done");
                self.set_state(ConnectionState::Active);
            }
        }

        tokio::spawn(heartbeat_loop(
            conn.clone(),
            self.session.clone(),
            self.bot_id.clone(),
            self.config.heartbeat_interval,
            self.config.ack_timeout,
        ));
        Ok(())
    }
}

// =============================================================================
// Inbound processing
// =============================================================================

/// Drains queued data frames into the pool until the queue's sender is gone
/// or the pool is closed.
async fn feed_pool(
    mut pending: mpsc::Receiver<Queued>,
    pool: WorkerPool,
    normalizer: Arc<dyn Normalizer>,
    handler: BoxedInboundHandler,
    bot_id: String,
) {
    while let Some(Queued { sn, payload }) = pending.recv().await {
        let normalizer = normalizer.clone();
        let handler = handler.clone();
        let task_bot_id = bot_id.clone();

        let work = async move {
            match normalizer.normalize(&payload) {
                Ok(Some(inbound)) => {
                    trace!(bot_id = %task_bot_id, sn = ?sn, kind = inbound.kind(), "Dispatching inbound");
                    handler.handle(inbound).await;
                }
                Ok(None) => trace!(bot_id = %task_bot_id, sn = ?sn, "Nothing to dispatch"),
                Err(e) => warn!(bot_id = %task_bot_id, sn = ?sn, error = %e, "Failed to normalize payload"),
            }
        };

        if pool.submit(work).await.is_none() {
            debug!(bot_id = %bot_id, "Worker pool closed, discarding queued frames");
            break;
        }
    }
}

// =============================================================================
// Heartbeat
// =============================================================================

async fn heartbeat_loop(
    conn: Arc<Connection>,
    session: Arc<Mutex<SessionState>>,
    bot_id: String,
    interval: Duration,
    ack_timeout: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = conn.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let sn = session.lock().last_sequence;
        if let Err(e) = conn.transport.send(Frame::ping(sn).encode()).await {
            warn!(bot_id = %bot_id, error = %e, "Failed to send heartbeat");
            conn.shutdown(GatewayError::Transport(e));
            break;
        }
        debug!(bot_id = %bot_id, sn = ?sn, "Heartbeat sent");

        tokio::spawn(watchdog(conn.clone(), bot_id.clone(), ack_timeout));
    }
}

async fn watchdog(conn: Arc<Connection>, bot_id: String, deadline: Duration) {
    let mut acked = conn.ack.subscribe();
    let outcome = tokio::select! {
        _ = conn.cancel.cancelled() => return,
        res = tokio::time::timeout(deadline, acked.wait_for(|ack| *ack)) => res.map(|r| r.is_ok()),
    };

    match outcome {
        Ok(true) => {
            conn.ack.send_replace(false);
        }
        Ok(false) => {}
        Err(_) => {
            if conn.shutdown(GatewayError::HeartbeatTimeout(deadline)) {
                warn!(bot_id = %bot_id, timeout = ?deadline, "Heartbeat ack missing, closing connection");
            }
        }
    }
}
