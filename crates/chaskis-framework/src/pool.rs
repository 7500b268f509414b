//! Bounded pool for handler background work.
//!
//! Work handed off with [`WorkerPool::spawn`] leaves the serialized dispatch
//! path. Permits come from a FIFO-fair semaphore, so a plugin that floods the
//! pool queues behind everyone else instead of starving them.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default number of background jobs that may run at once.
pub const DEFAULT_POOL_SIZE: usize = 32;

/// A fair, bounded pool of background tasks.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl WorkerPool {
    /// Creates a pool allowing `size` concurrent jobs (at least one).
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
            shutdown: CancellationToken::new(),
        }
    }

    /// Runs `job` once a permit is free.
    ///
    /// The job is dropped without running if the pool shuts down first.
    pub fn spawn<F>(&self, name: &str, job: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        let shutdown = self.shutdown.clone();
        let name = name.to_string();

        tokio::spawn(async move {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(job = %name, "Pool shut down before job started");
                    return;
                }
                permit = permits.acquire_owned() => permit,
            };
            let Ok(_permit) = permit else {
                warn!(job = %name, "Worker pool closed");
                return;
            };

            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(job = %name, "Background job cancelled by pool shutdown");
                }
                _ = job => {}
            }
        })
    }

    /// Number of permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Cancels queued and running jobs.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
