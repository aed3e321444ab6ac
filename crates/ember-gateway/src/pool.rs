//! Bounded worker pool for inbound processing.
//!
//! Each connection's feeder task hands queued data frames to
//! [`WorkerPool::submit`]. The call only waits for a free slot, never for the
//! submitted work to finish.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::trace;

/// Runs submitted futures on the tokio runtime with at most `capacity` in
/// flight at once.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    /// Creates a pool; a capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Spawns `task` once a slot is free.
    ///
    /// Returns `None` if the pool was closed while waiting.
    pub async fn submit<F>(&self, task: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self.permits.clone().acquire_owned().await.ok()?;
        trace!(in_flight = self.in_flight(), "Submitting inbound work");
        Some(tokio::spawn(async move {
            let _permit = permit;
            task.await;
        }))
    }

    /// Number of tasks currently running.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rejects all pending and future submissions. Running tasks finish.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}
