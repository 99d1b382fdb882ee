//! Module worker pool.
//!
//! The pool manages multiple worker threads, distributing load requests
//! using round-robin scheduling. Senders wait when a worker queue is full.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::{
    config::LoaderConfig,
    error::{LoadFailure, Result},
    loader::ModuleRunner,
    worker::{LoadRequest, ModuleWorker},
    Exports,
};

/// A pool of module workers, each evaluating artifacts in fresh runtimes.
pub struct ModulePool {
    workers: Vec<ModuleWorker>,
    next_worker: AtomicUsize,
}

impl ModulePool {
    /// Create a new pool, spawning one thread per worker.
    pub fn new(config: &LoaderConfig) -> Result<Self> {
        let workers = (0..config.worker_count)
            .map(|index| ModuleWorker::spawn(index, config.max_pending))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            worker_count = workers.len(),
            max_pending = config.max_pending,
            "Module pool initialized"
        );

        Ok(Self {
            workers,
            next_worker: AtomicUsize::new(0),
        })
    }

    /// Get pool statistics (passive - no I/O).
    pub fn stats(&self) -> ModulePoolStats {
        ModulePoolStats {
            worker_count: self.workers.len(),
            workers_with_capacity: self.workers.iter().filter(|w| w.has_capacity()).count(),
            workers_exited: self.workers.iter().filter(|w| w.is_closed()).count(),
        }
    }
}

#[async_trait]
impl ModuleRunner for ModulePool {
    async fn import(&self, artifact: &Path) -> std::result::Result<Exports, LoadFailure> {
        let (response_tx, response_rx) = oneshot::channel();

        // Round-robin worker selection, skipping workers whose thread exited
        let start = self.next_worker.fetch_add(1, Ordering::Relaxed);
        let worker = (0..self.workers.len())
            .map(|offset| &self.workers[start.wrapping_add(offset) % self.workers.len()])
            .find(|worker| !worker.is_closed())
            .ok_or_else(|| LoadFailure::Unavailable("all module workers have exited".to_string()))?;

        worker
            .sender()
            .send(LoadRequest {
                artifact: artifact.to_path_buf(),
                response_tx,
            })
            .await
            .map_err(|_| LoadFailure::Unavailable("module worker channel closed".to_string()))?;

        response_rx.await.map_err(|_| {
            LoadFailure::Unavailable("module worker dropped the request".to_string())
        })?
    }
}

/// Pool statistics (passive data).
#[derive(Debug, Clone, Serialize)]
pub struct ModulePoolStats {
    pub worker_count: usize,
    pub workers_with_capacity: usize,
    pub workers_exited: usize,
}
