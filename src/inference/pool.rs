//! Bounded execution of inference on the blocking thread pool.
//!
//! At most `workers` model calls run at once and at most `queue` more
//! requests wait for a worker. Anything beyond that is refused with
//! [`InferenceError::Busy`]. Each request gets `timeout` from admission to
//! result; a call that overruns keeps its worker until the model returns,
//! the caller just stops waiting.

use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{Annotated, InferenceAdapter, InferenceError};

pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_QUEUE: usize = 8;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const MAX_WORKERS: usize = 256;
pub const MAX_QUEUE: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    pub workers: usize,
    pub queue: usize,
    pub timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue: DEFAULT_QUEUE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

pub struct InferencePool {
    adapter: Arc<InferenceAdapter>,
    workers: Arc<Semaphore>,
    admission: Arc<Semaphore>,
    settings: PoolSettings,
}

impl InferencePool {
    #[must_use]
    pub fn new(adapter: Arc<InferenceAdapter>, settings: PoolSettings) -> Self {
        let settings = PoolSettings {
            workers: settings.workers.clamp(1, MAX_WORKERS),
            queue: settings.queue.min(MAX_QUEUE),
            ..settings
        };
        Self {
            adapter,
            workers: Arc::new(Semaphore::new(settings.workers)),
            admission: Arc::new(Semaphore::new(settings.workers + settings.queue)),
            settings,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> PoolSettings {
        self.settings
    }

    #[must_use]
    pub fn detector_name(&self) -> &str {
        self.adapter.detector_name()
    }

    /// Requests currently admitted (running or queued).
    #[must_use]
    pub fn in_flight(&self) -> usize {
        (self.settings.workers + self.settings.queue) - self.admission.available_permits()
    }

    /// Annotate an uploaded image.
    ///
    /// # Errors
    /// [`InferenceError::Busy`] when the queue is full,
    /// [`InferenceError::Timeout`] when the deadline passes, and anything
    /// [`InferenceAdapter::annotate`] returns.
    pub async fn annotate(&self, bytes: Vec<u8>) -> Result<Annotated, InferenceError> {
        let admitted = Arc::clone(&self.admission)
            .try_acquire_owned()
            .map_err(|_| {
                warn!(in_flight = self.in_flight(), "Inference queue full, rejecting request");
                InferenceError::Busy
            })?;

        let workers = Arc::clone(&self.workers);
        let adapter = Arc::clone(&self.adapter);
        let run = async move {
            let slot = workers
                .acquire_owned()
                .await
                .map_err(|_| InferenceError::Busy)?;
            debug!("Inference worker acquired");
            tokio::task::spawn_blocking(move || {
                let _slot = slot;
                let _admitted = admitted;
                adapter.annotate(&bytes)
            })
            .await?
        };

        let timeout = self.settings.timeout;
        tokio::time::timeout(timeout, run).await.map_err(|_| {
            warn!(timeout_ms = timeout.as_millis(), "Inference timed out");
            InferenceError::Timeout(timeout)
        })?
    }
}
