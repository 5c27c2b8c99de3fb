//! Vocabulary for structured drain and daemon logs.
//!
//! Every record carries the run and host correlation IDs plus the pipeline
//! stage, so JSONL output from many hosts can be merged and filtered.

use serde::{Deserialize, Serialize};

/// Severity of a JSONL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Pipeline stage a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// One pass over the journal.
    Drain,
    /// Long-running drain loop.
    Daemon,
    /// Rotated-file retention.
    Sweep,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Init => "init",
            Stage::Drain => "drain",
            Stage::Daemon => "daemon",
            Stage::Sweep => "sweep",
        })
    }
}

/// Stable event names (used as the tracing target and the JSONL `event` key).
pub mod event_names {
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    pub const DRAIN_STARTED: &str = "drain.started";
    pub const DRAIN_FILE_CLAIMED: &str = "drain.file_claimed";
    pub const DRAIN_BATCH_SENT: &str = "drain.batch_sent";
    pub const DRAIN_BATCH_REJECTED: &str = "drain.batch_rejected";
    pub const DRAIN_REQUEUED: &str = "drain.requeued";
    pub const DRAIN_FINISHED: &str = "drain.finished";
    pub const DRAIN_LOCK_HELD: &str = "drain.lock_held";

    pub const DAEMON_STARTED: &str = "daemon.started";
    pub const DAEMON_PASS: &str = "daemon.pass";
    pub const DAEMON_STOPPED: &str = "daemon.stopped";

    pub const SEND_THROTTLED: &str = "send.throttled";
    pub const SEND_REJECTED: &str = "send.rejected";
    pub const SEND_UNCONFIGURED: &str = "send.unconfigured";

    pub const SWEEP_FINISHED: &str = "sweep.finished";
    pub const SHUTDOWN_SPILLED: &str = "shutdown.spilled";

    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Correlation IDs shared by every record of one CLI invocation.
///
/// Attached to each record by the `log_event!` macro.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_carries_ids() {
        let ctx = LogContext::new("run-abc", "host-xyz");
        assert_eq!(ctx.run_id, "run-abc");
        assert_eq!(ctx.host_id, "host-xyz");
    }

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [Stage::Init, Stage::Drain, Stage::Daemon, Stage::Sweep] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_level_from_tracing() {
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warn);
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Trace);
    }
}
