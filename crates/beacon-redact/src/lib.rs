//! Redaction and signing for beacon telemetry.
//!
//! This crate provides the de-identification step of the recording pipeline
//! and the integrity protection of the delivery step.
//!
//! # Key Features
//!
//! - **Key deny-list**: any payload key matching a configured name
//!   (case-insensitive) has its value replaced with a fixed mask token,
//!   whatever its nesting depth or value type.
//! - **Secret value scrubbing**: optionally masks string values that look like
//!   credentials (AWS keys, GitHub tokens, JWTs, bearer headers, URLs with
//!   embedded passwords) even when their key is not on the deny-list.
//! - **Idempotent**: redacting an already-redacted payload is a no-op.
//! - **Payload signing**: HMAC-SHA256 over `timestamp + "." + body`.
//!
//! # Example
//!
//! ```
//! use beacon_redact::{RedactionPolicy, Redactor};
//! use serde_json::json;
//!
//! let redactor = Redactor::new(RedactionPolicy::with_keys(["password"]));
//! let mut payload = json!({"password": "secret123", "user": "alice"});
//! redactor.redact_value(&mut payload);
//! assert_eq!(payload, json!({"password": "********", "user": "alice"}));
//! ```

pub mod detect;
pub mod engine;
pub mod error;
pub mod policy;
pub mod sign;

pub use detect::{SecretDetector, SecretType};
pub use engine::Redactor;
pub use error::{RedactionError, Result};
pub use policy::{RedactionPolicy, DEFAULT_MASK};
pub use sign::PayloadSigner;
