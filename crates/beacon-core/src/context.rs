//! Per-request trace context.
//!
//! One `TraceContext` is created per request or job and passed explicitly to
//! the recorder. It owns the trace id, the optional session id, the context
//! mapping shared by every event of the trace, the monotonic start instant
//! and the "currently recording" flag that stops instrumentation from
//! recording its own activity.

use std::cell::Cell;
use std::time::Instant;

use beacon_common::{Payload, TraceId};

#[derive(Debug)]
pub struct TraceContext {
    trace_id: TraceId,
    session_id: Option<String>,
    shared: Payload,
    started: Instant,
    recording: Cell<bool>,
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceContext {
    /// Fresh context with a generated trace id.
    pub fn new() -> Self {
        TraceContext {
            trace_id: TraceId::generate(),
            session_id: None,
            shared: Payload::new(),
            started: Instant::now(),
            recording: Cell::new(false),
        }
    }

    /// Context continuing a propagated trace (e.g. a queued job). Blank ids
    /// fall back to a generated one.
    pub fn continuing(trace_id: &str) -> Self {
        let mut ctx = Self::new();
        ctx.resume(trace_id);
        ctx
    }

    /// Reset at a new trace boundary: adopt `trace_id`, clear the session and
    /// shared context, restart the monotonic clock.
    pub fn resume(&mut self, trace_id: &str) {
        self.trace_id = TraceId::parse(trace_id).unwrap_or_else(TraceId::generate);
        self.session_id = None;
        self.shared.clear();
        self.started = Instant::now();
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Set the session id once per trace. Returns `false` (and keeps the
    /// existing value) if one is already set or `id` is blank.
    pub fn set_session_id(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.session_id.is_some() || id.trim().is_empty() {
            return false;
        }
        self.session_id = Some(id);
        true
    }

    /// Merge keys into the shared context. Later values win.
    pub fn merge_context(&mut self, values: Payload) {
        self.shared.extend(values);
    }

    pub fn context(&self) -> &Payload {
        &self.shared
    }

    /// Nanoseconds since the context started (saturating).
    pub fn elapsed_ns(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Whether a recording is in progress on this context.
    pub fn is_recording(&self) -> bool {
        self.recording.get()
    }

    /// Mark the context as recording until the guard drops. `None` if a
    /// recording is already in progress.
    pub fn enter_recording(&self) -> Option<RecordingGuard<'_>> {
        if self.recording.replace(true) {
            return None;
        }
        Some(RecordingGuard { ctx: self })
    }
}

/// Clears the recording flag on drop, including during unwinding.
#[derive(Debug)]
pub struct RecordingGuard<'a> {
    ctx: &'a TraceContext,
}

impl Drop for RecordingGuard<'_> {
    fn drop(&mut self) {
        self.ctx.recording.set(false);
    }
}
