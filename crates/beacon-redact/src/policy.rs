//! Redaction policy configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{RedactionError, Result};

/// Fixed token that replaces redacted values.
pub const DEFAULT_MASK: &str = "********";

/// Redaction policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RedactionPolicy {
    /// Payload keys whose values are always masked (case-insensitive).
    #[serde(default = "default_keys")]
    pub keys: Vec<String>,

    /// Replacement token for masked values.
    #[serde(default = "default_mask")]
    pub mask: String,

    /// Also mask string values that look like credentials.
    #[serde(default)]
    pub scrub_secret_values: bool,
}

fn default_keys() -> Vec<String> {
    [
        "password",
        "passwd",
        "secret",
        "token",
        "api_key",
        "apikey",
        "access_token",
        "refresh_token",
        "authorization",
        "cookie",
        "set-cookie",
        "credit_card",
        "card_number",
        "cvv",
        "ssn",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

fn default_mask() -> String {
    DEFAULT_MASK.to_string()
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            keys: default_keys(),
            mask: default_mask(),
            scrub_secret_values: false,
        }
    }
}

impl RedactionPolicy {
    /// Policy with an explicit deny-list and the default mask.
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Check the policy for values that would make redaction meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.mask.is_empty() {
            return Err(RedactionError::PolicyError(
                "mask token must not be empty".to_string(),
            ));
        }
        if let Some(pos) = self.keys.iter().position(|k| k.trim().is_empty()) {
            return Err(RedactionError::PolicyError(format!(
                "redaction key at index {} is empty",
                pos
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RedactionPolicy::default();
        assert!(policy.keys.contains(&"password".to_string()));
        assert!(policy.keys.contains(&"authorization".to_string()));
        assert_eq!(policy.mask, "********");
        assert!(!policy.scrub_secret_values);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let policy: RedactionPolicy = serde_json::from_str(r#"{"keys": ["pin"]}"#).unwrap();
        assert_eq!(policy.keys, vec!["pin".to_string()]);
        assert_eq!(policy.mask, DEFAULT_MASK);
    }

    #[test]
    fn test_validate_rejects_empty_mask() {
        let policy = RedactionPolicy {
            mask: String::new(),
            ..RedactionPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(RedactionError::PolicyError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_key() {
        let policy = RedactionPolicy::with_keys(["password", "  "]);
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }
}
