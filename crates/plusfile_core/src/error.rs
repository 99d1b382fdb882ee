//! Core errors (pure - no I/O variants).

use thiserror::Error;

/// Failures raised by the pure validation and path logic.
///
/// `Usage` is a mistake in user input and is meant to be shown to the user as
/// is. `Internal` is a broken precondition of this workspace itself and is
/// never user-actionable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("{0}")]
    Usage(String),

    #[error("Internal invariant violated: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns true if the error stems from user input.
    pub fn is_usage(&self) -> bool {
        matches!(self, CoreError::Usage(_))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
