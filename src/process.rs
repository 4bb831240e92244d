//! Off-thread execution of the transform pipeline.
//!
//! Decode, resize, and encode are CPU-bound and can take hundreds of
//! milliseconds for a large photo. Running them directly on a request task
//! would stall every other request scheduled on the same runtime thread, so
//! [`TransformPool::run`] hands each job to tokio's blocking thread pool.
//!
//! ## Bounded fan-out
//!
//! `spawn_blocking` alone would start as many concurrent encodes as there
//! are requests. The pool gates jobs behind a semaphore sized from
//! [`config::effective_workers`](crate::config::effective_workers); excess
//! jobs wait (asynchronously) for a permit. The permit is held by the
//! blocking closure itself, so a request that disconnects mid-transform
//! still finishes its job and releases the permit normally.

use crate::imaging::{
    BackendError, Derivative, ImageBackend, RustBackend, TransformRequest, transform,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Transform worker panicked: {0}")]
    WorkerPanicked(String),
    #[error("Transform pool is closed")]
    PoolClosed,
}

/// Runs [`transform`] on blocking threads, at most `workers` at a time.
pub struct TransformPool<B = RustBackend> {
    backend: Arc<B>,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl<B> Clone for TransformPool<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            permits: Arc::clone(&self.permits),
            workers: self.workers,
        }
    }
}

impl<B: ImageBackend + 'static> TransformPool<B> {
    /// Create a pool. `workers` below 1 is treated as 1.
    pub fn new(backend: B, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            backend: Arc::new(backend),
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run the pipeline for `request` on `original` without blocking the caller.
    pub async fn run(
        &self,
        original: Vec<u8>,
        request: TransformRequest,
    ) -> Result<Derivative, ProcessError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ProcessError::PoolClosed)?;
        let backend = Arc::clone(&self.backend);

        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            transform(backend.as_ref(), &original, &request)
        })
        .await
        .map_err(|e| ProcessError::WorkerPanicked(e.to_string()))?;

        Ok(result?)
    }
}
