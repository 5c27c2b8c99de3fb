//! The recording entry point.
//!
//! [`Recorder::record`] turns `(type, name, payload)` into a finished
//! [`Event`] and hands it to the active buffer:
//!
//! 1. enable check
//! 2. sampling
//! 3. filters
//! 4. assembly (ids, timestamps, host, memory, environment, release)
//! 5. redaction
//! 6. enrichment
//! 7. `Buffer::push`
//!
//! No step touches the network, and none can fail the caller: the whole call
//! runs inside the fail-open boundary and reports what happened through
//! [`RecordOutcome`] only.

pub mod enrich;
pub mod filter;
pub mod sampling;

pub use enrich::{DeploymentEnricher, Enricher, StaticEnricher};
pub use filter::{FilterDecision, FilterInput, FilterRegistry};
pub use sampling::Sampler;

use std::sync::Arc;

use beacon_buffer::Buffer;
use beacon_common::{Event, EventId, Payload};
use beacon_config::AgentConfig;
use beacon_redact::Redactor;
use chrono::Utc;
use tracing::debug;

use crate::boundary::fail_open;
use crate::context::TraceContext;
use crate::logging::DIAGNOSTIC_TARGET;
use crate::system;

/// What happened to one `record` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Handed to the buffer.
    Buffered,
    /// Telemetry is switched off.
    Disabled,
    /// Another recording is in progress on the same context.
    Reentrant,
    /// Dropped by sampling.
    Sampled,
    /// Dropped by a filter.
    Filtered,
    /// An internal failure was contained; nothing was buffered.
    Failed,
}

pub struct Recorder {
    enabled: bool,
    sampler: Sampler,
    filters: FilterRegistry,
    redactor: Redactor,
    enrichers: Vec<Box<dyn Enricher>>,
    environment: Option<String>,
    release: Option<String>,
    host: String,
    buffer: Arc<dyn Buffer>,
}

impl Recorder {
    pub fn new(config: &AgentConfig, buffer: Arc<dyn Buffer>) -> Self {
        Recorder {
            enabled: config.enabled,
            sampler: Sampler::new(config.sampling.clone()),
            filters: FilterRegistry::new(),
            redactor: Redactor::new(config.redaction.clone()),
            enrichers: Vec::new(),
            environment: config.environment.clone(),
            release: config.release.clone(),
            host: system::hostname(),
            buffer,
        }
    }

    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }

    pub fn add_enricher(&mut self, enricher: impl Enricher + 'static) {
        self.enrichers.push(Box::new(enricher));
    }

    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record one event. Never panics, never blocks on the network.
    pub fn record(
        &self,
        ctx: &TraceContext,
        event_type: &str,
        name: &str,
        payload: Payload,
    ) -> RecordOutcome {
        fail_open("record", RecordOutcome::Failed, || {
            self.record_inner(ctx, event_type, name, payload)
        })
    }

    fn record_inner(
        &self,
        ctx: &TraceContext,
        event_type: &str,
        name: &str,
        mut payload: Payload,
    ) -> RecordOutcome {
        if !self.enabled {
            return RecordOutcome::Disabled;
        }
        let Some(_recording) = ctx.enter_recording() else {
            return RecordOutcome::Reentrant;
        };

        if !self.sampler.should_keep(event_type, &payload) {
            return RecordOutcome::Sampled;
        }

        let input = FilterInput {
            event_type,
            name,
            payload: &payload,
        };
        if self.filters.evaluate(&input) == FilterDecision::Reject {
            return RecordOutcome::Filtered;
        }

        self.redactor.redact_map(&mut payload);
        let mut context = ctx.context().clone();
        self.redactor.redact_map(&mut context);

        let event = Event {
            id: EventId::generate(),
            trace_id: ctx.trace_id().clone(),
            session_id: ctx.session_id().map(str::to_string),
            event_type: event_type.to_string(),
            name: name.to_string(),
            payload,
            context,
            timestamp: Utc::now(),
            monotonic_ns: ctx.elapsed_ns(),
            host: self.host.clone(),
            memory: system::resident_memory_bytes(),
            environment: self.environment.clone(),
            release: self.release.clone(),
            enrichment: self.enrichment(),
        };

        let buffer = &self.buffer;
        fail_open("buffer.push", (), move || buffer.push(event));
        RecordOutcome::Buffered
    }

    /// Merge every enricher's block; one that panics is skipped.
    fn enrichment(&self) -> Payload {
        let mut merged = Payload::new();
        for enricher in &self.enrichers {
            match fail_open("enrich", None, || enricher.enrich()) {
                Some(block) => merged.extend(block),
                None => debug!(
                    target: DIAGNOSTIC_TARGET,
                    enricher = enricher.name(),
                    "enricher contributed nothing"
                ),
            }
        }
        merged
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("enabled", &self.enabled)
            .field("filters", &self.filters)
            .field("enrichers", &self.enrichers.len())
            .field("backend", &self.buffer.backend())
            .finish()
    }
}
