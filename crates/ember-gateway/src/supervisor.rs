//! Supervised reconnect loop around a [`ProtocolStateMachine`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use ember_core::{BoxedInboundHandler, GatewayError, GatewayResult};

use crate::machine::ProtocolStateMachine;
use crate::session::{ConnectionState, SessionState};

/// Restarts the state machine whenever a connection attempt ends, with a
/// fixed delay between attempts, until [`close`](Self::close) is called.
///
/// Connection-level errors never escape `connect`; they are logged and
/// retried. Closing is terminal: a closed supervisor never reconnects.
pub struct ConnectionSupervisor {
    machine: Arc<ProtocolStateMachine>,
    stop: CancellationToken,
    running: AtomicBool,
}

/// Clears the running flag when the connect loop exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ConnectionSupervisor {
    pub fn new(machine: ProtocolStateMachine) -> Self {
        Self {
            machine: Arc::new(machine),
            stop: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn machine(&self) -> &Arc<ProtocolStateMachine> {
        &self.machine
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    pub fn session(&self) -> SessionState {
        self.machine.session()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Runs connection attempts until stopped.
    ///
    /// Returns [`GatewayError::AlreadyRunning`] if another `connect` call is
    /// still active on this supervisor.
    pub async fn connect(&self, handler: BoxedInboundHandler) -> GatewayResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GatewayError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        let span = info_span!("gateway", bot_id = %self.machine.bot_id());
        self.connect_loop(handler).instrument(span).await;
        Ok(())
    }

    async fn connect_loop(&self, handler: BoxedInboundHandler) {
        let delay = self.machine.config().reconnect_delay;
        let mut attempt: u64 = 0;

        while !self.stop.is_cancelled() {
            attempt += 1;
            let result = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                result = self.machine.run_once(handler.clone()) => result,
            };

            if self.stop.is_cancelled() {
                break;
            }
            match result {
                Ok(()) => info!(attempt, "Connection ended"),
                Err(e) => warn!(attempt, error = %e, delay = ?delay, "Connection lost, reconnecting"),
            }

            self.machine.set_state(ConnectionState::Reconnecting);
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.machine.set_state(ConnectionState::Disconnected);
        info!("Connection supervisor stopped");
    }

    /// Stops the connect loop, force-closes the live connection and closes
    /// the worker pool so no queued frame starts afterwards.
    pub async fn close(&self) {
        self.stop.cancel();
        self.machine.pool().close();
        self.machine.close().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::GatewayConfig;
    use crate::test_support::{
        MockConnector, MockLocator, MockTransport, RecordingHandler, TextNormalizer, hello,
    };

    fn supervisor(connector: &Arc<MockConnector>) -> Arc<ConnectionSupervisor> {
        let machine = ProtocolStateMachine::new(
            "bot1",
            connector.clone(),
            MockLocator::new("wss://gw"),
            Arc::new(TextNormalizer),
            GatewayConfig::default(),
        );
        Arc::new(ConnectionSupervisor::new(machine))
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_fixed_delay() {
        let (tx1, first) = MockTransport::pair();
        drop(tx1);
        let connector = MockConnector::with(vec![first]);
        let supervisor = supervisor(&connector);
        let (handler, _seen) = RecordingHandler::new();

        let task = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.connect(handler).await })
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(supervisor.state(), ConnectionState::Reconnecting);

        // Attempts at t=0, 10, 20, 30 with no transports left after the first.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.attempts(), 4);

        supervisor.close().await;
        task.await.unwrap().unwrap();
        assert!(!supervisor.is_running());
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn second_connect_is_rejected() {
        let (tx, transport) = MockTransport::pair();
        tx.send(hello(0, "s1")).unwrap();
        let connector = MockConnector::with(vec![transport]);
        let supervisor = supervisor(&connector);
        let (handler, _seen) = RecordingHandler::new();

        let mut states = supervisor.machine().subscribe();
        let task = {
            let supervisor = supervisor.clone();
            let handler = handler.clone();
            tokio::spawn(async move { supervisor.connect(handler).await })
        };
        states
            .wait_for(|s| *s == ConnectionState::Active)
            .await
            .unwrap();

        let err = supervisor.connect(handler).await.unwrap_err();
        assert!(matches!(err, GatewayError::AlreadyRunning));

        supervisor.close().await;
        task.await.unwrap().unwrap();
        drop(tx);
    }

    #[tokio::test]
    async fn close_is_terminal() {
        let connector = MockConnector::with(Vec::new());
        let supervisor = supervisor(&connector);
        let (handler, _seen) = RecordingHandler::new();

        supervisor.close().await;
        supervisor.connect(handler).await.unwrap();
        assert_eq!(connector.attempts(), 0);
        assert!(supervisor.is_closed());
        assert!(supervisor.machine().pool().is_closed());
    }
}
