use std::{env, path::PathBuf};

use crate::error::{LoaderError, Result};

/// Settings of the loading pipeline (validated).
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    /// Number of module worker threads.
    pub worker_count: usize,
    /// Queued load requests per worker before senders wait.
    pub max_pending: usize,
    /// Path or name of the esbuild executable.
    pub esbuild_path: PathBuf,
}

impl LoaderConfig {
    pub fn new(worker_count: usize, max_pending: usize, esbuild_path: PathBuf) -> Result<Self> {
        if worker_count == 0 {
            return Err(LoaderError::InvalidWorkerCount);
        }
        if max_pending == 0 {
            return Err(LoaderError::InvalidMaxPending);
        }

        Ok(Self {
            worker_count,
            max_pending,
            esbuild_path,
        })
    }

    /// `worker_count` workers, 100 pending requests, `esbuild` from `PATH`.
    pub fn with_defaults(worker_count: usize) -> Result<Self> {
        Self::new(worker_count, 100, PathBuf::from("esbuild"))
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PLUSFILE_WORKERS` - worker threads (default: available parallelism)
    /// - `PLUSFILE_MAX_PENDING` - pending requests per worker (default: 100)
    /// - `PLUSFILE_ESBUILD` - esbuild executable (default: "esbuild")
    pub fn from_env() -> Result<Self> {
        let worker_count = env::var("PLUSFILE_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_worker_count);
        let max_pending = env::var("PLUSFILE_MAX_PENDING")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let esbuild_path = env::var_os("PLUSFILE_ESBUILD")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("esbuild"));

        Self::new(worker_count, max_pending, esbuild_path)
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}
