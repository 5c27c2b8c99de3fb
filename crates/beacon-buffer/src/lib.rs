//! Beacon event buffers.
//!
//! A `Buffer` holds finished events until they can be shipped. Three backends
//! are provided, one active per deployment:
//!
//! - [`MemoryBuffer`]: bounded in-process list; overflow and failed deliveries
//!   spill to the journal
//! - [`JournalBuffer`]: append-only JSONL file shared by every process on the
//!   host, drained out of band
//! - [`SharedBuffer`]: bounded list in an external store (see [`ListStore`]);
//!   failed deliveries spill to the journal
//!
//! `push` never fails and never touches the network. Errors are reported to
//! the `beacon::diagnostic` log target and otherwise swallowed.

use std::panic::{catch_unwind, AssertUnwindSafe};

use beacon_common::{Deliver, DeliveryOutcome, Event};
use tracing::{debug, warn};

pub mod error;
pub mod journal;
pub mod lock;
pub mod memory;
pub mod retention;
pub mod shared;
pub mod store;

pub use error::{BufferError, Result, StoreError};
pub use journal::{JournalBuffer, JournalLine, JournalLines, JournalOptions, JournalStatus};
pub use lock::JournalLock;
pub use memory::MemoryBuffer;
pub use retention::RetentionEvent;
pub use shared::SharedBuffer;
pub use store::{InProcessListStore, ListStore};

#[cfg(feature = "redis")]
pub use store::RedisListStore;

/// Holding area for events prior to delivery.
pub trait Buffer: Send + Sync {
    /// Add one event. Never blocks on the network and never fails.
    fn push(&self, event: Event);

    /// Atomically take the current contents, leaving the buffer empty.
    fn flush(&self) -> Vec<Event>;

    /// Keep a batch whose delivery failed but may succeed later.
    fn retain(&self, batch: Vec<Event>);

    /// Short backend name for logs and status output.
    fn backend(&self) -> &'static str;

    /// Flush and hand the batch to `sender`.
    ///
    /// Retryable, throttled and unconfigured outcomes keep the batch via
    /// [`Buffer::retain`]; a rejected batch is dropped. A panicking sender
    /// counts as retryable.
    fn flush_and_send(&self, sender: &dyn Deliver) -> DeliveryOutcome {
        let batch = self.flush();
        if batch.is_empty() {
            return DeliveryOutcome::Delivered;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| sender.deliver(&batch))).unwrap_or_else(
            |_| {
                debug!(target: "beacon::diagnostic", "sender panicked during flush");
                DeliveryOutcome::Retryable
            },
        );

        if outcome.should_retain() {
            debug!(
                backend = self.backend(),
                count = batch.len(),
                outcome = %outcome,
                "delivery failed; retaining batch"
            );
            self.retain(batch);
        } else if outcome == DeliveryOutcome::Rejected {
            warn!(
                backend = self.backend(),
                count = batch.len(),
                "collector rejected batch; dropping"
            );
        }
        outcome
    }

    /// Move anything that would die with the process to durable storage.
    /// Called once at teardown.
    fn spill(&self) -> usize {
        0
    }
}
