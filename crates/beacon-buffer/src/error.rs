//! Buffer and store errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from buffer backends.
///
/// These never reach the recording caller: `Buffer::push` logs and swallows
/// them. They surface only through the explicit journal APIs used by the
/// drain command and `beacon status`.
#[derive(Error, Debug)]
pub enum BufferError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("journal lock unavailable: {0}")]
    LockUnavailable(PathBuf),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl BufferError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BufferError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from a `ListStore`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store command failed: {0}")]
    Command(String),
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

impl From<BufferError> for beacon_common::Error {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::Io { source, .. } => beacon_common::Error::Io(source),
            BufferError::LockUnavailable(path) => {
                beacon_common::Error::LockUnavailable(path.display().to_string())
            }
            BufferError::Serialize(e) => beacon_common::Error::Json(e),
            BufferError::Store(e) => beacon_common::Error::Store(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, BufferError>;
