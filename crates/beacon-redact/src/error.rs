//! Error types for redaction and signing.

use thiserror::Error;

/// Result type for redaction operations.
pub type Result<T> = std::result::Result<T, RedactionError>;

/// Errors that can occur while building a redactor or signer.
#[derive(Error, Debug)]
pub enum RedactionError {
    /// The redaction policy is unusable.
    #[error("policy error: {0}")]
    PolicyError(String),

    /// The signing key is unusable.
    #[error("key error: {0}")]
    KeyError(String),
}
