//! Error taxonomy for the harness.
//!
//! Only [`HarnessError::NotConfigured`] is meant to reach a caller as a
//! hard failure. I/O trouble is reported per item or degraded to a cache
//! miss, and malformed model output becomes a default record.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// No credential, backend, or model is available for the operation.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Disk or network failure during hashing, ledger access, or a remote call.
    #[error("transient I/O failure: {0}")]
    TransientIo(String),

    /// Model text could not be decoded into the expected shape.
    #[error("malformed model output: {0}")]
    MalformedOutput(String),
}

impl HarnessError {
    pub fn transient(err: impl std::fmt::Display) -> Self {
        HarnessError::TransientIo(err.to_string())
    }

    pub fn is_not_configured(&self) -> bool {
        matches!(self, HarnessError::NotConfigured(_))
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(err: std::io::Error) -> Self {
        HarnessError::TransientIo(err.to_string())
    }
}

/// Result type for harness operations.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
