//! Network delivery of event batches.
//!
//! One `deliver` call:
//!
//! 1. empty batch: delivered, no request
//! 2. suppression window active: throttled, no request
//! 3. endpoint or API key missing: unconfigured (warned once)
//! 4. body `{"events": [...]}`, optionally signed, then optionally gzipped
//! 5. up to `max_attempts` POSTs with exponential backoff and jitter
//!
//! 2xx is delivered. 429 opens a suppression window from `Retry-After` and
//! stops. Any other 4xx is a permanent rejection and is not retried. Network
//! errors and 5xx are retried until the attempt budget runs out.

pub mod throttle;
pub mod transport;

pub use throttle::{parse_retry_after, LocalThrottle, SharedThrottle, Throttle};
pub use transport::{HttpReply, Transport, TransportError, UreqTransport};

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beacon_common::{
    Deliver, DeliveryOutcome, Event, EventBatch, AGENT_VERSION, INTERNAL_MARKER_HEADER,
};
use beacon_config::AgentConfig;
use beacon_redact::PayloadSigner;
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use crate::boundary::fail_open;
use crate::logging::{event_names, DIAGNOSTIC_TARGET};

/// Delivery settings resolved from the agent configuration.
#[derive(Debug, Clone)]
pub struct SenderSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub compression: bool,
    pub signer: Option<PayloadSigner>,
}

impl SenderSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let signer = if config.delivery.signing.enabled {
            config.signing_secret().and_then(|secret| match PayloadSigner::new(secret) {
                Ok(signer) => Some(signer),
                Err(e) => {
                    warn!(error = %e, "payload signing disabled");
                    None
                }
            })
        } else {
            None
        };
        SenderSettings {
            endpoint: non_blank(&config.endpoint),
            api_key: non_blank(&config.api_key),
            max_attempts: config.delivery.max_attempts.max(1),
            initial_backoff: config.delivery.initial_backoff(),
            compression: config.delivery.compression,
            signer,
        }
    }
}

/// Sends batches to the collector over a [`Transport`].
pub struct Sender<T: Transport = UreqTransport> {
    settings: SenderSettings,
    transport: T,
    throttle: Arc<dyn Throttle>,
    warned_unconfigured: AtomicBool,
}

impl Sender<UreqTransport> {
    /// Production sender with a process-local throttle.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::with_throttle(config, Arc::new(LocalThrottle::new()))
    }

    /// Production sender sharing `throttle` (e.g. a [`SharedThrottle`]).
    pub fn with_throttle(config: &AgentConfig, throttle: Arc<dyn Throttle>) -> Self {
        Sender::new(
            SenderSettings::from_config(config),
            UreqTransport::new(config.delivery.timeout()),
            throttle,
        )
    }
}

impl<T: Transport> Sender<T> {
    pub fn new(settings: SenderSettings, transport: T, throttle: Arc<dyn Throttle>) -> Self {
        Sender {
            settings,
            transport,
            throttle,
            warned_unconfigured: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &SenderSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn throttle(&self) -> &Arc<dyn Throttle> {
        &self.throttle
    }

    /// Delay after failed attempt `attempt` (1-based): `initial * 2^(attempt-1)`
    /// plus up to half that again in jitter. The jitter range never reaches
    /// the next base, so delays never shrink.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self
            .settings
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let half_ms = (base.as_millis() / 2) as u64;
        let jitter = if half_ms == 0 {
            0
        } else {
            rand::random_range(0..half_ms)
        };
        base + Duration::from_millis(jitter)
    }

    /// Headers and wire body for one batch.
    fn build_request(
        &self,
        api_key: &str,
        batch: &[Event],
    ) -> Option<(Vec<(String, String)>, Vec<u8>)> {
        let body = match serde_json::to_vec(&EventBatch { events: batch }) {
            Ok(body) => body,
            Err(e) => {
                debug!(target: DIAGNOSTIC_TARGET, error = %e, "batch serialization failed");
                return None;
            }
        };

        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Authorization".to_string(), format!("Bearer {}", api_key)),
            ("X-Agent-Version".to_string(), AGENT_VERSION.to_string()),
            (INTERNAL_MARKER_HEADER.to_string(), "true".to_string()),
        ];

        // The signature covers the uncompressed body.
        if let Some(signer) = &self.settings.signer {
            let ts = Utc::now().timestamp();
            headers.push(("X-Signature".to_string(), signer.sign(ts, &body)));
            headers.push(("X-Timestamp".to_string(), ts.to_string()));
        }

        if self.settings.compression {
            match gzip(&body) {
                Ok(compressed) => {
                    headers.push(("Content-Encoding".to_string(), "gzip".to_string()));
                    return Some((headers, compressed));
                }
                Err(e) => {
                    debug!(
                        target: DIAGNOSTIC_TARGET,
                        error = %e,
                        "gzip failed; sending uncompressed"
                    );
                }
            }
        }
        Some((headers, body))
    }

    fn deliver_inner(&self, batch: &[Event]) -> DeliveryOutcome {
        if batch.is_empty() {
            return DeliveryOutcome::Delivered;
        }
        if self.throttle.is_throttled() {
            debug!(count = batch.len(), "suppression window active; not sending");
            return DeliveryOutcome::Throttled;
        }
        let (Some(endpoint), Some(api_key)) = (&self.settings.endpoint, &self.settings.api_key)
        else {
            if !self.warned_unconfigured.swap(true, Ordering::Relaxed) {
                warn!(
                    target: event_names::SEND_UNCONFIGURED,
                    "telemetry endpoint or API key not configured; events are kept on disk"
                );
            }
            return DeliveryOutcome::Unconfigured;
        };
        let Some((headers, body)) = self.build_request(api_key, batch) else {
            return DeliveryOutcome::Rejected;
        };

        let max_attempts = self.settings.max_attempts;
        for attempt in 1..=max_attempts {
            match self.transport.post(endpoint, &headers, &body) {
                Ok(reply) if (200..300).contains(&reply.status) => {
                    return DeliveryOutcome::Delivered;
                }
                Ok(reply) if reply.status == 429 => {
                    let window = parse_retry_after(reply.retry_after.as_deref(), Utc::now());
                    self.throttle.throttle_for(window);
                    warn!(
                        target: event_names::SEND_THROTTLED,
                        retry_after_secs = window.as_secs(),
                        "collector is rate limiting; suppressing sends"
                    );
                    return DeliveryOutcome::Throttled;
                }
                Ok(reply) if (400..500).contains(&reply.status) => {
                    warn!(
                        target: event_names::SEND_REJECTED,
                        status = reply.status,
                        count = batch.len(),
                        "collector rejected batch"
                    );
                    return DeliveryOutcome::Rejected;
                }
                Ok(reply) => {
                    debug!(attempt, status = reply.status, "collector returned server error");
                }
                Err(e) => {
                    debug!(attempt, error = %e, "delivery attempt failed");
                }
            }
            if attempt < max_attempts {
                self.transport.pause(self.backoff_delay(attempt));
            }
        }
        DeliveryOutcome::Retryable
    }
}

impl<T: Transport> Deliver for Sender<T> {
    fn deliver(&self, batch: &[Event]) -> DeliveryOutcome {
        fail_open("send", DeliveryOutcome::Retryable, || self.deliver_inner(batch))
    }
}

impl<T: Transport> std::fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("endpoint", &self.settings.endpoint)
            .field("max_attempts", &self.settings.max_attempts)
            .field("compression", &self.settings.compression)
            .field("signing", &self.settings.signer.is_some())
            .finish()
    }
}

fn gzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 4), Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_common::{EventId, Payload, TraceId};
    use flate2::read::GzDecoder;
    use std::io::Read;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Request {
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    impl Request {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Replays scripted replies and records requests and pauses.
    #[derive(Default)]
    struct MockTransport {
        replies: Mutex<Vec<Result<HttpReply, String>>>,
        requests: Mutex<Vec<Request>>,
        pauses: Mutex<Vec<Duration>>,
    }

    impl MockTransport {
        fn always(status: u16) -> Self {
            Self::scripted(vec![Ok(HttpReply { status, retry_after: None }); 16])
        }

        fn scripted(mut replies: Vec<Result<HttpReply, String>>) -> Self {
            replies.reverse();
            MockTransport {
                replies: Mutex::new(replies),
                ..Default::default()
            }
        }

        fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }

        fn pauses(&self) -> Vec<Duration> {
            self.pauses.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        fn post(
            &self,
            _url: &str,
            headers: &[(String, String)],
            body: &[u8],
        ) -> Result<HttpReply, TransportError> {
            self.requests.lock().unwrap().push(Request {
                headers: headers.to_vec(),
                body: body.to_vec(),
            });
            match self.replies.lock().unwrap().pop() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(e)) => Err(TransportError::Network(e)),
                None => Ok(HttpReply { status: 200, retry_after: None }),
            }
        }

        fn pause(&self, delay: Duration) {
            self.pauses.lock().unwrap().push(delay);
        }
    }

    fn settings() -> SenderSettings {
        SenderSettings {
            endpoint: Some("https://collector.test/ingest".into()),
            api_key: Some("key-123".into()),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            compression: false,
            signer: None,
        }
    }

    fn sender(settings: SenderSettings, transport: MockTransport) -> Sender<MockTransport> {
        Sender::new(settings, transport, Arc::new(LocalThrottle::new()))
    }

    fn batch() -> Vec<Event> {
        vec![Event {
            id: EventId::generate(),
            trace_id: TraceId::generate(),
            session_id: None,
            event_type: "request".into(),
            name: "GET /".into(),
            payload: Payload::new(),
            context: Payload::new(),
            timestamp: Utc::now(),
            monotonic_ns: 1,
            host: "web-1".into(),
            memory: 0,
            environment: None,
            release: None,
            enrichment: Payload::new(),
        }]
    }

    #[test]
    fn test_empty_batch_makes_no_request() {
        let s = sender(settings(), MockTransport::always(500));
        assert!(s.send(&[]));
        assert!(s.transport().requests().is_empty());
    }

    #[test]
    fn test_success_on_2xx() {
        let s = sender(settings(), MockTransport::always(202));
        assert_eq!(s.deliver(&batch()), DeliveryOutcome::Delivered);
        assert_eq!(s.transport().requests().len(), 1);
    }

    #[test]
    fn test_server_errors_exhaust_attempts_with_growing_delays() {
        let s = sender(settings(), MockTransport::always(500));
        assert!(!s.send(&batch()));

        assert_eq!(s.transport().requests().len(), 3);
        let pauses = s.transport().pauses();
        assert_eq!(pauses.len(), 2);
        assert!(pauses[0] >= Duration::from_millis(100));
        assert!(pauses[1] >= pauses[0]);
    }

    #[test]
    fn test_network_error_then_success() {
        let transport = MockTransport::scripted(vec![
            Err("connection refused".into()),
            Ok(HttpReply { status: 200, retry_after: None }),
        ]);
        let s = sender(settings(), transport);
        assert_eq!(s.deliver(&batch()), DeliveryOutcome::Delivered);
        assert_eq!(s.transport().requests().len(), 2);
    }

    #[test]
    fn test_client_error_not_retried() {
        let s = sender(settings(), MockTransport::always(401));
        assert_eq!(s.deliver(&batch()), DeliveryOutcome::Rejected);
        assert_eq!(s.transport().requests().len(), 1);
        assert!(s.transport().pauses().is_empty());
    }

    #[test]
    fn test_429_suppresses_following_sends() {
        let transport = MockTransport::scripted(vec![Ok(HttpReply {
            status: 429,
            retry_after: Some("30".into()),
        })]);
        let s = sender(settings(), transport);

        assert_eq!(s.deliver(&batch()), DeliveryOutcome::Throttled);
        for _ in 0..5 {
            assert_eq!(s.deliver(&batch()), DeliveryOutcome::Throttled);
        }
        assert_eq!(s.transport().requests().len(), 1);
    }

    #[test]
    fn test_unconfigured_makes_no_request() {
        let mut cfg = settings();
        cfg.api_key = None;
        let s = sender(cfg, MockTransport::always(200));
        assert_eq!(s.deliver(&batch()), DeliveryOutcome::Unconfigured);
        assert_eq!(s.deliver(&batch()), DeliveryOutcome::Unconfigured);
        assert!(s.transport().requests().is_empty());
    }

    #[test]
    fn test_headers_and_body() {
        let s = sender(settings(), MockTransport::always(200));
        let events = batch();
        s.deliver(&events);

        let request = &s.transport().requests()[0];
        assert_eq!(request.header("Authorization"), Some("Bearer key-123"));
        assert_eq!(request.header("X-Agent-Version"), Some(AGENT_VERSION));
        assert_eq!(request.header(INTERNAL_MARKER_HEADER), Some("true"));
        assert_eq!(request.header("Content-Encoding"), None);
        assert_eq!(request.header("X-Signature"), None);

        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["events"][0]["id"], events[0].id.as_str());
    }

    #[test]
    fn test_signature_matches_independent_hmac() {
        let mut cfg = settings();
        cfg.signer = Some(PayloadSigner::new("shh").unwrap());
        let s = sender(cfg, MockTransport::always(200));
        s.deliver(&batch());

        let request = &s.transport().requests()[0];
        let ts: i64 = request.header("X-Timestamp").unwrap().parse().unwrap();
        let signature = request.header("X-Signature").unwrap();

        let verifier = PayloadSigner::new("shh").unwrap();
        assert!(verifier.verify(ts, &request.body, signature));
    }

    #[test]
    fn test_gzip_body_decodes_to_signed_json() {
        let mut cfg = settings();
        cfg.compression = true;
        cfg.signer = Some(PayloadSigner::new("shh").unwrap());
        let s = sender(cfg, MockTransport::always(200));
        s.deliver(&batch());

        let request = &s.transport().requests()[0];
        assert_eq!(request.header("Content-Encoding"), Some("gzip"));

        let mut json = Vec::new();
        GzDecoder::new(&request.body[..]).read_to_end(&mut json).unwrap();
        let ts: i64 = request.header("X-Timestamp").unwrap().parse().unwrap();
        let verifier = PayloadSigner::new("shh").unwrap();
        assert!(verifier.verify(ts, &json, request.header("X-Signature").unwrap()));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = AgentConfig {
            endpoint: Some("https://c.test".into()),
            api_key: Some("  ".into()),
            ..Default::default()
        };
        config.delivery.signing.enabled = true;
        config.delivery.signing.secret = Some("s".into());

        let settings = SenderSettings::from_config(&config);
        assert_eq!(settings.api_key, None);
        assert!(settings.signer.is_some());
        assert_eq!(settings.max_attempts, 3);
    }

    #[test]
    fn test_backoff_doubles() {
        let s = sender(settings(), MockTransport::always(200));
        for attempt in 1..6 {
            let d = s.backoff_delay(attempt);
            let base = Duration::from_millis(100 * 2u64.pow(attempt - 1));
            assert!(d >= base && d < base + base / 2, "attempt {}: {:?}", attempt, d);
        }
    }
}
