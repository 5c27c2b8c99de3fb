//! Beacon telemetry agent.
//!
//! In-process side:
//! - [`context::TraceContext`]: per-request trace and session correlation
//! - [`recorder::Recorder`]: sample, filter, redact, enrich, buffer
//! - [`sender::Sender`]: batched HTTP delivery with retry and rate-limit handling
//! - [`agent::Agent`]: wires one buffer, recorder and sender together
//!
//! Out-of-process side:
//! - [`drain::Drainer`]: ships the on-disk journal
//! - [`daemon::Daemon`]: repeats drain passes on an interval
//!
//! The `beacon` binary entry point is in `main.rs`.

pub mod agent;
pub mod boundary;
pub mod context;
pub mod daemon;
pub mod drain;
pub mod exit_codes;
pub mod logging;
pub mod recorder;
pub mod sender;
pub mod system;

pub use agent::{Agent, ShutdownGuard};
pub use context::TraceContext;
pub use recorder::{RecordOutcome, Recorder};
pub use sender::Sender;
