//! Unified error type for durasync core services.

use durasync_types::{BackendError, ConfigError};
use serde::Serialize;
use thiserror::Error;

/// Main error type for all core operations.
///
/// Recoverable conditions (a corrupted save, an unavailable backend, a remote
/// call that ran out of attempts) are reported as values, not through this
/// type. What ends up here is cancellation, caller mistakes and I/O that the
/// caller has to know about.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// Empty slot/key/function name and similar caller mistakes.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The cancellation token fired before the operation reached its commit point.
    #[error("Operation cancelled")]
    Cancelled,

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A model or payload could not be turned into text.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A store adapter failed in a way that is not a plain io::Error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend adapter failure that the caller asked to see directly.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl CoreError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl Serialize for CoreError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Bail out with [`CoreError::Cancelled`] if the token has fired.
#[inline]
pub(crate) fn ensure_not_cancelled(cancel: &tokio_util::sync::CancellationToken) -> CoreResult<()> {
    if cancel.is_cancelled() {
        return Err(CoreError::Cancelled);
    }
    Ok(())
}
