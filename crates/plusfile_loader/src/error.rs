//! Loader errors including I/O operations.

use plusfile_core::CoreError;
use thiserror::Error;

use crate::deps::ResolveError;

/// Fatal errors: the current operation is aborted.
///
/// Failures of the user's own module (it does not compile, it throws) are not
/// errors of this kind, see [`LoadFailure`].
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Failed to read package manifest {path}: {reason}")]
    ManifestRead { path: String, reason: String },

    #[error("Worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("Max pending requests must be at least 1")]
    InvalidMaxPending,

    #[error("Failed to spawn module worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoaderError>;

/// Why a plus file could not produce exports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// The compiler rejected the file.
    #[error("Transform failed: {0}")]
    Transform(String),

    /// The module failed to load, threw during evaluation or exported a
    /// value that cannot leave the JS runtime.
    #[error("Module evaluation failed: {0}")]
    Evaluate(String),

    /// No JS runtime was available to run the module.
    #[error("Module runtime unavailable: {0}")]
    Unavailable(String),
}
