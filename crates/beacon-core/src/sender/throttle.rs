//! Rate-limit suppression windows.
//!
//! After a 429 the sender stops making requests until the collector's
//! `Retry-After` window has passed. [`LocalThrottle`] scopes the window to the
//! process; [`SharedThrottle`] keeps it in the shared list store with a TTL so
//! every process on the host backs off together. Readers and writers race
//! benignly: the worst case is one extra attempt or one extra suppression.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use beacon_buffer::ListStore;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::logging::DIAGNOSTIC_TARGET;

/// Window used when `Retry-After` is missing or unreadable.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

pub trait Throttle: Send + Sync {
    fn is_throttled(&self) -> bool;

    /// Suppress sends for `window` from now.
    fn throttle_for(&self, window: Duration);
}

#[derive(Debug, Default)]
pub struct LocalThrottle {
    until: Mutex<Option<Instant>>,
}

impl LocalThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left in the current window, if any.
    pub fn remaining(&self) -> Option<Duration> {
        let until = (*self.until.lock().unwrap_or_else(|p| p.into_inner()))?;
        until.checked_duration_since(Instant::now())
    }
}

impl Throttle for LocalThrottle {
    fn is_throttled(&self) -> bool {
        self.remaining().is_some_and(|d| !d.is_zero())
    }

    fn throttle_for(&self, window: Duration) {
        *self.until.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now() + window);
    }
}

/// Suppression flag stored in the shared list store under `key`.
pub struct SharedThrottle {
    store: Arc<dyn ListStore>,
    key: String,
}

impl SharedThrottle {
    pub fn new(store: Arc<dyn ListStore>, key: impl Into<String>) -> Self {
        SharedThrottle {
            store,
            key: key.into(),
        }
    }
}

impl Throttle for SharedThrottle {
    /// Store errors read as "not throttled".
    fn is_throttled(&self) -> bool {
        match self.store.get(&self.key) {
            Ok(flag) => flag.is_some(),
            Err(e) => {
                debug!(target: DIAGNOSTIC_TARGET, error = %e, "throttle flag read failed");
                false
            }
        }
    }

    fn throttle_for(&self, window: Duration) {
        let window_delta =
            chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
        let until = Utc::now() + window_delta;
        if let Err(e) = self
            .store
            .set_with_ttl(&self.key, &until.timestamp().to_string(), window)
        {
            debug!(target: DIAGNOSTIC_TARGET, error = %e, "throttle flag write failed");
        }
    }
}

impl std::fmt::Debug for SharedThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedThrottle").field("key", &self.key).finish()
    }
}

/// Parse a `Retry-After` header: delta-seconds or an HTTP-date.
///
/// Missing or unparseable values give [`DEFAULT_RETRY_AFTER`]; dates in the
/// past give a zero window.
pub fn parse_retry_after(value: Option<&str>, now: DateTime<Utc>) -> Duration {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_RETRY_AFTER;
    };
    if let Ok(secs) = value.parse::<u64>() {
        return Duration::from_secs(secs);
    }
    match DateTime::parse_from_rfc2822(value) {
        Ok(at) => (at.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO),
        Err(_) => DEFAULT_RETRY_AFTER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_buffer::InProcessListStore;

    #[test]
    fn test_retry_after_seconds() {
        assert_eq!(parse_retry_after(Some("30"), Utc::now()), Duration::from_secs(30));
        assert_eq!(parse_retry_after(Some(" 0 "), Utc::now()), Duration::ZERO);
    }

    #[test]
    fn test_retry_after_http_date() {
        let now: DateTime<Utc> = "2026-03-01T12:00:00Z".parse().unwrap();
        let window = parse_retry_after(Some("Sun, 01 Mar 2026 12:02:00 GMT"), now);
        assert_eq!(window, Duration::from_secs(120));

        let past = parse_retry_after(Some("Sun, 01 Mar 2026 11:00:00 GMT"), now);
        assert_eq!(past, Duration::ZERO);
    }

    #[test]
    fn test_retry_after_defaults() {
        assert_eq!(parse_retry_after(None, Utc::now()), DEFAULT_RETRY_AFTER);
        assert_eq!(parse_retry_after(Some(""), Utc::now()), DEFAULT_RETRY_AFTER);
        assert_eq!(parse_retry_after(Some("soon"), Utc::now()), DEFAULT_RETRY_AFTER);
        assert_eq!(parse_retry_after(Some("-5"), Utc::now()), DEFAULT_RETRY_AFTER);
    }

    #[test]
    fn test_local_window() {
        let throttle = LocalThrottle::new();
        assert!(!throttle.is_throttled());

        throttle.throttle_for(Duration::from_secs(30));
        assert!(throttle.is_throttled());
        assert!(throttle.remaining().unwrap() <= Duration::from_secs(30));

        throttle.throttle_for(Duration::ZERO);
        assert!(!throttle.is_throttled());
    }

    #[test]
    fn test_shared_window_visible_to_other_handles() {
        let store: Arc<dyn ListStore> = Arc::new(InProcessListStore::new());
        let writer = SharedThrottle::new(store.clone(), "beacon:rate_limited");
        let reader = SharedThrottle::new(store, "beacon:rate_limited");

        assert!(!reader.is_throttled());
        writer.throttle_for(Duration::from_secs(30));
        assert!(reader.is_throttled());
    }
}
