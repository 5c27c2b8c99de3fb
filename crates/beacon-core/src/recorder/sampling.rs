//! Sampling decisions.
//!
//! A rate in `[0, 1]` is resolved per event type; the event is kept when a
//! uniform draw in `[0, 1)` falls below it. Outbound HTTP events get two
//! extra rules: failed or slow calls are always kept, and an exact
//! destination-host entry overrides the type rate.

use beacon_common::Payload;
use beacon_config::SamplingConfig;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Sampler {
    config: SamplingConfig,
}

impl Sampler {
    pub fn new(config: SamplingConfig) -> Self {
        Sampler { config }
    }

    /// Keep probability for this event, clamped to `[0, 1]`.
    pub fn resolve_rate(&self, event_type: &str, payload: &Payload) -> f64 {
        let http = &self.config.http_client;
        if event_type == http.event_type {
            if is_forced(payload, http.slow_threshold_ms) {
                return 1.0;
            }
            if let Some(rate) = destination_host(payload).and_then(|h| http.host_rates.get(&h)) {
                return clamp(*rate);
            }
        }
        clamp(self.config.rate_for(event_type))
    }

    pub fn should_keep(&self, event_type: &str, payload: &Payload) -> bool {
        self.keep_with_draw(event_type, payload, rand::random::<f64>())
    }

    /// Decision for a given uniform draw in `[0, 1)`.
    pub fn keep_with_draw(&self, event_type: &str, payload: &Payload, draw: f64) -> bool {
        let rate = self.resolve_rate(event_type, payload);
        if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            draw < rate
        }
    }
}

fn clamp(rate: f64) -> f64 {
    if rate.is_nan() {
        1.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

/// Server error, explicit failure flag, or slower than the threshold.
fn is_forced(payload: &Payload, slow_threshold_ms: u64) -> bool {
    let status = ["status", "status_code"]
        .iter()
        .find_map(|k| payload.get(*k).and_then(Value::as_u64));
    if status.is_some_and(|s| s >= 500) {
        return true;
    }
    if payload.get("failed").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    payload
        .get("duration_ms")
        .and_then(Value::as_f64)
        .is_some_and(|ms| ms > slow_threshold_ms as f64)
}

/// `host` field, else the authority of `url`. Port is kept when present.
fn destination_host(payload: &Payload) -> Option<String> {
    if let Some(host) = payload.get("host").and_then(Value::as_str) {
        return Some(host.to_string());
    }
    let url = payload.get("url").and_then(Value::as_str)?;
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    (!host.is_empty()).then(|| host.to_string())
}
