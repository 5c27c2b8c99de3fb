//! Event and trace identity types.
//!
//! Event IDs are time-ordered so journal and collector views sort naturally.
//! They are not a uniqueness guarantee across retries: a resent batch keeps
//! its original IDs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a single event.
///
/// Format: UUIDv7 in hyphenated form, so lexical order follows creation time
/// at millisecond granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// Generate a new time-ordered event ID.
    pub fn generate() -> Self {
        EventId(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier correlating all events of one logical request or job.
///
/// Generated IDs are 32 lowercase hex chars. Propagated IDs (e.g. carried by a
/// queued job) are accepted verbatim as long as they are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a fresh trace ID.
    pub fn generate() -> Self {
        TraceId(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Accept a propagated trace ID.
    ///
    /// Returns `None` for empty or whitespace-only input.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(TraceId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ids_are_time_ordered() {
        let first = EventId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = EventId::generate();
        assert!(first < second, "{} should sort before {}", first, second);
    }

    #[test]
    fn test_trace_id_format() {
        let id = TraceId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_trace_id_parse() {
        assert_eq!(
            TraceId::parse("  abc-123 "),
            Some(TraceId("abc-123".to_string()))
        );
        assert_eq!(TraceId::parse(""), None);
        assert_eq!(TraceId::parse("   "), None);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = TraceId("t-1".to_string());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"t-1\"");
    }
}
