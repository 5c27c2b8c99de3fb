//! The delivery seam between buffers and the network sender.

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Result of one delivery attempt for a whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Collector confirmed receipt (2xx).
    Delivered,
    /// Network error or 5xx after the retry budget was spent.
    Retryable,
    /// Collector asked us to back off (429), or a suppression window is active.
    Throttled,
    /// Permanent client error (4xx other than 429). Resending repeats the rejection.
    Rejected,
    /// Endpoint or credentials are missing.
    Unconfigured,
}

impl DeliveryOutcome {
    pub fn is_delivered(self) -> bool {
        self == DeliveryOutcome::Delivered
    }

    /// Whether the batch should be kept on durable storage for a later attempt.
    pub fn should_retain(self) -> bool {
        matches!(
            self,
            DeliveryOutcome::Retryable | DeliveryOutcome::Throttled | DeliveryOutcome::Unconfigured
        )
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Retryable => "retryable",
            DeliveryOutcome::Throttled => "throttled",
            DeliveryOutcome::Rejected => "rejected",
            DeliveryOutcome::Unconfigured => "unconfigured",
        };
        write!(f, "{}", s)
    }
}

/// Something that can ship a batch of events.
///
/// Implementations must never panic or block indefinitely; a failure is
/// reported through the returned outcome.
pub trait Deliver: Send + Sync {
    fn deliver(&self, batch: &[Event]) -> DeliveryOutcome;

    /// `true` only on confirmed delivery.
    fn send(&self, batch: &[Event]) -> bool {
        self.deliver(batch).is_delivered()
    }
}
