//! Gateway timing and concurrency settings.

use std::time::Duration;

/// Settings shared by the state machine and its supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Delay between heartbeats while a session is up.
    pub heartbeat_interval: Duration,
    /// How long to wait for a heartbeat ack before force-closing.
    pub ack_timeout: Duration,
    /// Fixed delay between connection attempts.
    pub reconnect_delay: Duration,
    /// Maximum number of inbound frames processed concurrently.
    pub max_in_flight: usize,
    /// Data frames allowed to wait for a worker slot; later ones are dropped.
    pub queue_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            ack_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(10),
            max_in_flight: 64,
            queue_capacity: 1024,
        }
    }
}

impl GatewayConfig {
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}
