//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::settings::{AgentConfig, BufferBackend};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::SemanticError(_) => 63,
            ValidationError::MissingField(_) => 64,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

/// Validate agent configuration semantically.
///
/// A missing endpoint or api key is not an error here: the agent runs in
/// record-and-buffer mode and the sender reports `Unconfigured`.
pub fn validate_config(config: &AgentConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if let Some(endpoint) = config.endpoint.as_deref() {
        if !endpoint.is_empty()
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ValidationError::InvalidValue {
                field: "endpoint".to_string(),
                message: format!("Must be an http(s) URL, got {}", endpoint),
            });
        }
    }

    // Sampling
    validate_rate("sampling.default_rate", config.sampling.default_rate)?;
    for (event_type, rate) in &config.sampling.rates {
        validate_rate(&format!("sampling.rates.{}", event_type), *rate)?;
    }
    for (host, rate) in &config.sampling.http_client.host_rates {
        validate_rate(&format!("sampling.http_client.host_rates.{}", host), *rate)?;
    }

    // Redaction
    if config.redaction.mask.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "redaction.mask".to_string(),
            message: "Must not be empty".to_string(),
        });
    }

    // Delivery
    let delivery = &config.delivery;
    validate_positive("delivery.max_attempts", delivery.max_attempts as u64)?;
    validate_positive("delivery.timeout_ms", delivery.timeout_ms)?;
    if delivery.signing.enabled && config.signing_secret().is_none() {
        return Err(ValidationError::MissingField(
            "delivery.signing.secret (or api_key)".to_string(),
        ));
    }

    // Buffer
    let buffer = &config.buffer;
    validate_positive("buffer.memory_capacity", buffer.memory_capacity as u64)?;
    validate_positive("buffer.journal.max_file_bytes", buffer.journal.max_file_bytes)?;
    validate_rate(
        "buffer.journal.sweep_probability",
        buffer.journal.sweep_probability,
    )?;
    if buffer.backend == BufferBackend::Shared {
        if buffer.shared.url.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::MissingField("buffer.shared.url".to_string()));
        }
        validate_positive("buffer.shared.batch_size", buffer.shared.batch_size as u64)?;
        validate_positive("buffer.shared.max_len", buffer.shared.max_len as u64)?;
        if buffer.shared.key == buffer.shared.throttle_key {
            return Err(ValidationError::SemanticError(
                "buffer.shared.key and buffer.shared.throttle_key must differ".to_string(),
            ));
        }
    }

    // Drain
    validate_positive("drain.batch_size", config.drain.batch_size as u64)?;
    validate_positive("drain.interval_secs", config.drain.interval_secs)?;

    Ok(())
}

/// Validate a probability is in [0, 1].
fn validate_rate(field: &str, rate: f64) -> ValidationResult<()> {
    if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Must be in [0, 1], got {}", rate),
        });
    }
    Ok(())
}

fn validate_positive(field: &str, value: u64) -> ValidationResult<()> {
    if value == 0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: "Must be > 0".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&AgentConfig::default()), Ok(()));
    }

    #[test]
    fn test_rate_out_of_range() {
        let mut cfg = AgentConfig::default();
        cfg.sampling.rates.insert("request".to_string(), 1.5);
        let err = validate_config(&cfg).unwrap_err();
        assert_eq!(err.code(), 65);
        assert!(err.to_string().contains("sampling.rates.request"));
    }

    #[test]
    fn test_nan_rate_rejected() {
        let mut cfg = AgentConfig::default();
        cfg.sampling.default_rate = f64::NAN;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_version_mismatch() {
        let cfg = AgentConfig {
            schema_version: "0.9.0".to_string(),
            ..Default::default()
        };
        assert_eq!(validate_config(&cfg).unwrap_err().code(), 66);
    }

    #[test]
    fn test_non_http_endpoint() {
        let cfg = AgentConfig {
            endpoint: Some("ftp://collector".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&cfg),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "endpoint"
        ));
    }

    #[test]
    fn test_signing_without_secret() {
        let mut cfg = AgentConfig::default();
        cfg.delivery.signing.enabled = true;
        assert_eq!(validate_config(&cfg).unwrap_err().code(), 64);

        cfg.api_key = Some("key".to_string());
        assert_eq!(validate_config(&cfg), Ok(()));
    }

    #[test]
    fn test_shared_backend_needs_url() {
        let mut cfg = AgentConfig::default();
        cfg.buffer.backend = BufferBackend::Shared;
        assert!(matches!(
            validate_config(&cfg),
            Err(ValidationError::MissingField(_))
        ));
        cfg.buffer.shared.url = Some("redis://127.0.0.1/".to_string());
        assert_eq!(validate_config(&cfg), Ok(()));
    }

    #[test]
    fn test_zero_batch_size() {
        let mut cfg = AgentConfig::default();
        cfg.drain.batch_size = 0;
        assert!(validate_config(&cfg).is_err());
    }
}
