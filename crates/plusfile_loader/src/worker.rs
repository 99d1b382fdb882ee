//! Module worker thread management.
//!
//! Each worker runs in a dedicated thread with its own Tokio runtime
//! because `deno_core::JsRuntime` is not `Send`.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};

use crate::{
    error::{LoadFailure, LoaderError, Result},
    runtime, Exports,
};

/// Request sent to a worker to evaluate one artifact.
pub struct LoadRequest {
    /// Artifact to import.
    pub artifact: PathBuf,
    /// Channel to send the result back.
    pub response_tx: oneshot::Sender<std::result::Result<Exports, LoadFailure>>,
}

/// A dedicated module worker thread.
pub struct ModuleWorker {
    request_tx: mpsc::Sender<LoadRequest>,
}

impl ModuleWorker {
    /// Spawn a new worker thread.
    pub fn spawn(index: usize, max_pending: usize) -> Result<Self> {
        let (request_tx, mut request_rx) = mpsc::channel::<LoadRequest>(max_pending);

        std::thread::Builder::new()
            .name(format!("plusfile-worker-{index}"))
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        // Dropping the receiver fails every request sent to this worker.
                        tracing::error!(worker = index, error = %e, "Failed to create Tokio runtime for module worker");
                        return;
                    }
                };

                rt.block_on(async move {
                    tracing::debug!(worker = index, "Module worker started");

                    while let Some(req) = request_rx.recv().await {
                        let result = runtime::evaluate_module(&req.artifact).await;

                        // Send result back, ignoring if receiver dropped
                        let _ = req.response_tx.send(result);
                    }

                    tracing::debug!(worker = index, "Module worker shutting down");
                });
            })
            .map_err(LoaderError::WorkerSpawn)?;

        Ok(Self { request_tx })
    }

    /// A worker whose thread has exited closes its queue and accepts nothing.
    pub fn is_closed(&self) -> bool {
        self.request_tx.is_closed()
    }

    /// A worker whose thread has already exited.
    #[cfg(test)]
    pub(crate) fn exited() -> Self {
        let (request_tx, _) = mpsc::channel::<LoadRequest>(1);
        Self { request_tx }
    }

    /// Check if the worker has capacity for more requests.
    pub fn has_capacity(&self) -> bool {
        self.request_tx.capacity() > 0
    }

    /// Get a clone of the sender for sending requests.
    pub fn sender(&self) -> mpsc::Sender<LoadRequest> {
        self.request_tx.clone()
    }
}
