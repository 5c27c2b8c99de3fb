//! The telemetry event record.
//!
//! An `Event` is built once by the recorder and is immutable afterwards: buffers
//! store it, the sender ships it, and only buffer/sender infrastructure removes
//! it. The same serde shape is used on the wire (`{"events": [...]}`) and in the
//! on-disk journal (one event per line).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{EventId, TraceId};

/// Arbitrary nested mapping of string keys to JSON values.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// One discrete telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Time-ordered event identifier.
    pub id: EventId,

    /// Correlates all events from one logical request/job.
    pub trace_id: TraceId,

    /// Frontend session correlation, set at most once per request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Free-form classification (e.g. "request", "query", "http_client").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Free-form name within the type.
    pub name: String,

    /// Redacted event payload.
    #[serde(default)]
    pub payload: Payload,

    /// Context shared across all events of the trace.
    #[serde(default)]
    pub context: Payload,

    /// Wall-clock capture time.
    pub timestamp: DateTime<Utc>,

    /// Nanoseconds since the owning trace context started.
    #[serde(default)]
    pub monotonic_ns: u64,

    /// Host identity.
    pub host: String,

    /// Resident memory of the recording process in bytes.
    #[serde(default)]
    pub memory: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,

    /// Blocks merged in from long-lived enrichers (deployment, git commit, ...).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub enrichment: Payload,
}

impl Event {
    /// Serialize as a single journal line (no trailing newline).
    ///
    /// serde_json leaves `/` and non-ASCII characters unescaped, which is the
    /// journal's documented format.
    pub fn to_json_line(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse one journal line.
    pub fn from_json_line(line: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(line.trim_end_matches(&['\r', '\n'][..]))?)
    }
}

/// Wire body for one delivery: `{"events": [...]}`.
#[derive(Debug, Serialize)]
pub struct EventBatch<'a> {
    pub events: &'a [Event],
}
