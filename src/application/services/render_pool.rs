//! Bounded worker pool for CPU-bound rendering
//!
//! At most `workers` jobs run at once on tokio's blocking threads and at most
//! `queue_depth` more wait for a worker. Anything beyond that is rejected
//! straight away with [`RenderError::Busy`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::application::errors::RenderError;

pub struct RenderPool {
    workers: Arc<Semaphore>,
    admission: Arc<Semaphore>,
    capacity: u32,
    closed: AtomicBool,
}

impl RenderPool {
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        let workers = workers.max(1);
        let capacity = (workers + queue_depth) as u32;
        Self {
            workers: Arc::new(Semaphore::new(workers)),
            admission: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    /// Jobs running or waiting right now
    pub fn in_flight(&self) -> usize {
        self.capacity as usize - self.admission.available_permits()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Run `job` on a worker thread.
    ///
    /// Once admitted, the job runs to completion even if the caller stops
    /// waiting, whether it was still queued or already on a worker. Its result
    /// is then dropped.
    pub async fn run<F, T>(&self, job: F) -> Result<T, RenderError>
    where
        F: FnOnce() -> Result<T, RenderError> + Send + 'static,
        T: Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(RenderError::ShuttingDown);
        }

        let admitted = self
            .admission
            .clone()
            .try_acquire_owned()
            .map_err(|_| RenderError::Busy { capacity: self.capacity })?;

        let workers = self.workers.clone();
        let queued = tokio::spawn(async move {
            let worker = workers.acquire_owned().await.map_err(|_| RenderError::ShuttingDown)?;

            tokio::task::spawn_blocking(move || {
                let _permits = (admitted, worker);
                job()
            })
            .await
            .map_err(|e| RenderError::Worker(e.to_string()))?
        });

        queued.await.map_err(|e| RenderError::Worker(e.to_string()))?
    }

    /// Stop admitting jobs and wait up to `timeout` for admitted ones.
    ///
    /// Returns false if jobs were still running when the timeout expired.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.closed.store(true, Ordering::Release);

        match tokio::time::timeout(timeout, self.admission.acquire_many(self.capacity)).await {
            Ok(Ok(_all)) => true,
            Ok(Err(_)) => true,
            Err(_) => {
                tracing::warn!("{} render jobs still running after {:?}", self.in_flight(), timeout);
                false
            }
        }
    }
}
