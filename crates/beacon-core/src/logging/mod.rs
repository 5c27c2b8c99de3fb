//! Structured logging for the beacon agent and CLI.
//!
//! Two output modes, both on stderr so stdout stays reserved for command
//! output:
//! - human-readable console lines
//! - JSONL via [`JsonlLayer`]
//!
//! Failures swallowed by the fail-open boundary log at `debug` under the
//! [`DIAGNOSTIC_TARGET`] target; turn them on with
//! `BEACON_LOG=debug` or `RUST_LOG=beacon::diagnostic=debug`.

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;

use sha2::{Digest, Sha256};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Target for internal errors that were swallowed instead of propagated.
pub const DIAGNOSTIC_TARGET: &str = "beacon::diagnostic";

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(config: &LogConfig) {
    // RUST_LOG directives are finer-grained than a single level; honour them as-is.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    let result = match config.format {
        LogFormat::Human => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(JsonlLayer::stderr())
            .try_init(),
    };
    // Already installed (tests, embedding hosts with their own subscriber).
    let _ = result;
}

/// Unique ID for one CLI invocation: `run-` plus 12 hex chars.
pub fn generate_run_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{}", &id[..12])
}

/// Stable, non-reversible host identifier for log correlation.
///
/// Derived from `/etc/machine-id` when readable, otherwise from the hostname.
pub fn get_host_id() -> String {
    let seed = std::fs::read_to_string("/etc/machine-id")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(crate::system::hostname);
    let digest = hex::encode(Sha256::digest(seed.as_bytes()));
    format!("host-{}", &digest[..8])
}

/// Log through `tracing` with the run correlation fields attached.
///
/// ```ignore
/// log_event!(ctx, INFO, event_names::DRAIN_FINISHED, Stage::Drain, "drain complete",
///     events_sent = report.events_sent);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)* $(,)?) => {
        tracing::info!(target: $event, run_id = %$ctx.run_id, host_id = %$ctx.host_id,
            stage = %$stage, $($key = $val,)* "{}", $msg)
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)* $(,)?) => {
        tracing::warn!(target: $event, run_id = %$ctx.run_id, host_id = %$ctx.host_id,
            stage = %$stage, $($key = $val,)* "{}", $msg)
    };
    ($ctx:expr, ERROR, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)* $(,)?) => {
        tracing::error!(target: $event, run_id = %$ctx.run_id, host_id = %$ctx.host_id,
            stage = %$stage, $($key = $val,)* "{}", $msg)
    };
}
