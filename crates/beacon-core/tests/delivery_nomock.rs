//! No-mock delivery tests against a real HTTP listener.
//!
//! Covers:
//! - Post-response flush reaches the collector with redacted payloads
//! - Failed flush spills to the journal, and a later drain ships it
//! - Server errors are retried, then retained
//! - 429 opens a suppression window honoured by the next flush

mod support;

use std::sync::Arc;

use beacon_buffer::{Buffer, JournalBuffer};
use beacon_common::{DeliveryOutcome, Payload};
use beacon_config::AgentConfig;
use beacon_core::agent::{open_journal, Agent};
use beacon_core::drain::{DrainOptions, DrainStatus, Drainer};
use beacon_core::{RecordOutcome, Sender, TraceContext};
use serde_json::json;
use support::collector::{refused_url, FakeCollector, Reply};
use tempfile::TempDir;

fn config(dir: &TempDir, endpoint: &str) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.endpoint = Some(endpoint.to_string());
    config.api_key = Some("test-key".to_string());
    config.delivery.compression = false;
    config.delivery.initial_backoff_ms = 1;
    config.delivery.timeout_ms = 2_000;
    config.buffer.journal.dir = Some(dir.path().to_path_buf());
    config.buffer.journal.sweep_probability = 0.0;
    config
}

fn login_payload() -> Payload {
    let mut payload = Payload::new();
    payload.insert("user".into(), json!("ada"));
    payload.insert("password".into(), json!("hunter2"));
    payload
}

#[test]
fn flush_delivers_redacted_batch() {
    let dir = TempDir::new().unwrap();
    let collector = FakeCollector::start();
    let agent = Agent::from_config(&config(&dir, collector.url()));
    let ctx = TraceContext::new();

    assert_eq!(
        agent.record(&ctx, "request", "POST /login", login_payload()),
        RecordOutcome::Buffered
    );
    assert_eq!(agent.flush(), DeliveryOutcome::Delivered);

    let received = collector.received();
    assert_eq!(received.len(), 1);
    let request = &received[0];
    assert_eq!(request.path, "/ingest");
    assert_eq!(request.header("Authorization"), Some("Bearer test-key"));
    assert_eq!(request.header("X-Beacon-Internal"), Some("true"));

    let body = request.json();
    let event = &body["events"][0];
    assert_eq!(event["type"], "request");
    assert_eq!(event["payload"]["user"], "ada");
    assert_eq!(event["payload"]["password"], "********");
    assert_eq!(event["trace_id"], ctx.trace_id().0.as_str());
}

#[test]
fn failed_flush_spills_then_drain_ships() {
    let dir = TempDir::new().unwrap();

    let offline = Agent::from_config(&config(&dir, &refused_url()));
    let ctx = TraceContext::new();
    for _ in 0..3 {
        offline.record(&ctx, "job", "nightly-report", Payload::new());
    }
    assert_eq!(offline.flush(), DeliveryOutcome::Retryable);
    assert_eq!(offline.journal().read_all().unwrap().len(), 3);

    let collector = FakeCollector::start();
    let config = config(&dir, collector.url());
    let journal = open_journal(&config);
    let sender = Sender::from_config(&config);
    let report = Drainer::new(&journal, &sender, DrainOptions::default())
        .run()
        .unwrap();

    assert_eq!(report.status, DrainStatus::Clean);
    assert_eq!(report.events_sent, 3);
    assert_eq!(collector.total_events(), 3);
    assert!(journal.read_all().unwrap().is_empty());
}

#[test]
fn server_errors_retry_then_retain() {
    let dir = TempDir::new().unwrap();
    let collector = FakeCollector::scripted(vec![
        Reply::status(503),
        Reply::status(503),
        Reply::status(503),
    ]);
    let agent = Agent::from_config(&config(&dir, collector.url()));
    let ctx = TraceContext::new();

    agent.record(&ctx, "request", "GET /", Payload::new());
    assert_eq!(agent.flush(), DeliveryOutcome::Retryable);
    assert_eq!(collector.received().len(), 3);
    assert_eq!(agent.journal().read_all().unwrap().len(), 1);
}

#[test]
fn rate_limit_suppresses_next_flush() {
    let dir = TempDir::new().unwrap();
    let collector = FakeCollector::scripted(vec![Reply {
        status: 429,
        retry_after: Some(30),
    }]);
    let agent = Agent::from_config(&config(&dir, collector.url()));
    let ctx = TraceContext::new();

    agent.record(&ctx, "request", "GET /a", Payload::new());
    assert_eq!(agent.flush(), DeliveryOutcome::Throttled);

    agent.record(&ctx, "request", "GET /b", Payload::new());
    assert_eq!(agent.flush(), DeliveryOutcome::Throttled);

    // Only the first flush reached the network.
    assert_eq!(collector.received().len(), 1);
    assert_eq!(agent.journal().read_all().unwrap().len(), 2);
}

#[test]
fn rejected_batch_is_dropped() {
    let dir = TempDir::new().unwrap();
    let collector = FakeCollector::scripted(vec![Reply::status(400)]);
    let agent = Agent::from_config(&config(&dir, collector.url()));
    let ctx = TraceContext::new();

    agent.record(&ctx, "request", "GET /", Payload::new());
    assert_eq!(agent.flush(), DeliveryOutcome::Rejected);
    assert!(agent.journal().read_all().unwrap().is_empty());
}

#[test]
fn drain_requeues_on_outage() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, &refused_url());
    let journal: Arc<JournalBuffer> = Arc::new(open_journal(&config));
    for _ in 0..5 {
        let agent = Agent::from_config(&config);
        agent.record(&TraceContext::new(), "job", "sync", Payload::new());
        agent.buffer().spill();
    }
    assert_eq!(journal.read_all().unwrap().len(), 5);

    let sender = Sender::from_config(&config);
    let options = DrainOptions {
        batch_size: 2,
        force: false,
    };
    let report = Drainer::new(&journal, &sender, options).run().unwrap();

    assert_eq!(report.status, DrainStatus::Failed);
    assert_eq!(report.events_requeued, 5);
    assert_eq!(journal.read_all().unwrap().len(), 5);
    assert!(journal.processing_files().unwrap().is_empty());
}
