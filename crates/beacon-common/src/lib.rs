//! Beacon common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the beacon crates:
//! - The `Event` record that flows from the recorder to the collector
//! - Event and trace identifiers
//! - The `Deliver` seam between buffers and the sender
//! - The unified error taxonomy
//! - Output format specifications for the CLI

pub mod deliver;
pub mod error;
pub mod event;
pub mod id;
pub mod output;

pub use deliver::{Deliver, DeliveryOutcome};
pub use error::{Error, ErrorCategory, Result};
pub use event::{Event, EventBatch, Payload};
pub use id::{EventId, TraceId};
pub use output::OutputFormat;

/// Schema version for the event wire format and journal lines.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Agent version reported in the `X-Agent-Version` header.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header set on every outbound delivery so instrumentation can skip our own calls.
pub const INTERNAL_MARKER_HEADER: &str = "X-Beacon-Internal";
