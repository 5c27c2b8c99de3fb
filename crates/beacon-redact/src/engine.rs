//! Main redaction engine.
//!
//! The `Redactor` walks a JSON value recursively and masks every value whose
//! key is on the deny-list. Masking replaces the whole value (object, array,
//! number, ...) with the mask string, so nothing under a denied key survives.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::{RedactionPolicy, SecretDetector};

/// Payload redactor built from a `RedactionPolicy`.
#[derive(Clone)]
pub struct Redactor {
    /// Lowercased deny-list.
    denied: HashSet<String>,

    /// Replacement token.
    mask: String,

    /// Secret detector, present only when value scrubbing is enabled.
    detector: Option<SecretDetector>,
}

impl Redactor {
    /// Create a redactor for the given policy.
    pub fn new(policy: RedactionPolicy) -> Self {
        let denied = policy
            .keys
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        let detector = policy.scrub_secret_values.then(SecretDetector::new);

        Self {
            denied,
            mask: policy.mask,
            detector,
        }
    }

    /// The mask token written in place of redacted values.
    pub fn mask(&self) -> &str {
        &self.mask
    }

    /// Whether a key is on the deny-list.
    pub fn is_denied(&self, key: &str) -> bool {
        self.denied.contains(&key.to_lowercase())
    }

    /// Redact a payload map in place. Returns the number of values masked.
    pub fn redact_map(&self, map: &mut Map<String, Value>) -> usize {
        let mut masked = 0;
        for (key, value) in map.iter_mut() {
            if self.is_denied(key) {
                if !self.is_mask(value) {
                    masked += 1;
                }
                *value = Value::String(self.mask.clone());
            } else {
                masked += self.redact_value(value);
            }
        }
        masked
    }

    /// Redact any JSON value in place. Returns the number of values masked.
    pub fn redact_value(&self, value: &mut Value) -> usize {
        match value {
            Value::Object(map) => self.redact_map(map),
            Value::Array(items) => items.iter_mut().map(|v| self.redact_value(v)).sum(),
            Value::String(s) => match &self.detector {
                Some(detector) if detector.detect(s).is_some() => {
                    *value = Value::String(self.mask.clone());
                    1
                }
                _ => 0,
            },
            _ => 0,
        }
    }

    fn is_mask(&self, value: &Value) -> bool {
        value.as_str() == Some(self.mask.as_str())
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(RedactionPolicy::default())
    }
}
