//! Error types for beacon.
//!
//! The taxonomy mirrors how the pipeline reacts to a failure:
//! - Transient delivery errors are retried, then kept on disk
//! - Throttling opens a suppression window
//! - Permanent rejections are dropped
//! - Serialization errors drop the offending entry
//! - Storage errors are swallowed at the buffer boundary
//!
//! None of these ever reach the host application; they surface in logs and in
//! the exit codes of the drain command.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for beacon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Network failures and 5xx responses.
    Delivery,
    /// 429 responses and active suppression windows.
    Throttling,
    /// 4xx responses and missing credentials.
    Rejection,
    /// Encoding/decoding of events.
    Serialization,
    /// Journal files and external list stores.
    Storage,
    /// Configuration loading and validation.
    Config,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Delivery => write!(f, "delivery"),
            ErrorCategory::Throttling => write!(f, "throttling"),
            ErrorCategory::Rejection => write!(f, "rejection"),
            ErrorCategory::Serialization => write!(f, "serialization"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Config => write!(f, "config"),
        }
    }
}

/// Unified error type for beacon.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("collector returned server error {status}")]
    ServerError { status: u16 },

    #[error("throttled by collector for {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    #[error("collector rejected batch with status {status}")]
    Rejected { status: u16 },

    #[error("endpoint or credentials not configured")]
    Unconfigured,

    #[error("store error: {0}")]
    Store(String),

    #[error("lock unavailable: {0}")]
    LockUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Config,
            Error::Delivery(_) | Error::ServerError { .. } => ErrorCategory::Delivery,
            Error::Throttled { .. } => ErrorCategory::Throttling,
            Error::Rejected { .. } | Error::Unconfigured => ErrorCategory::Rejection,
            Error::Store(_) | Error::LockUnavailable(_) | Error::Io(_) => ErrorCategory::Storage,
            Error::Json(_) => ErrorCategory::Serialization,
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Delivery(_)
                | Error::ServerError { .. }
                | Error::Throttled { .. }
                | Error::Store(_)
                | Error::LockUnavailable(_)
                | Error::Io(_)
        )
    }
}
