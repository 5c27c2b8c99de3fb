//! Shared external-store backend.

use std::sync::Arc;

use beacon_common::Event;
use tracing::debug;

use crate::journal::JournalBuffer;
use crate::store::ListStore;
use crate::Buffer;

/// Bounded list in a store shared by every process on the host.
///
/// The list is trimmed on every push, so batches whose delivery failed go to
/// the `overflow` journal instead of back into the list.
pub struct SharedBuffer {
    store: Arc<dyn ListStore>,
    key: String,
    max_len: usize,
    batch_size: usize,
    overflow: Arc<JournalBuffer>,
}

impl SharedBuffer {
    pub fn new(
        store: Arc<dyn ListStore>,
        key: impl Into<String>,
        max_len: usize,
        batch_size: usize,
        overflow: Arc<JournalBuffer>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            max_len,
            batch_size,
            overflow,
        }
    }

    pub fn overflow(&self) -> &Arc<JournalBuffer> {
        &self.overflow
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &Arc<dyn ListStore> {
        &self.store
    }

    /// Entries currently in the shared list (0 if the store is unreachable).
    pub fn len(&self) -> usize {
        self.store.len(&self.key).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("key", &self.key)
            .field("max_len", &self.max_len)
            .field("batch_size", &self.batch_size)
            .field("overflow", &self.overflow.dir())
            .finish()
    }
}

impl Buffer for SharedBuffer {
    fn push(&self, event: Event) {
        let line = match event.to_json_line() {
            Ok(line) => line,
            Err(e) => {
                debug!(target: "beacon::diagnostic", error = %e, "skipping unserializable event");
                return;
            }
        };
        if let Err(e) = self.store.push_trim(&self.key, &line, self.max_len) {
            debug!(target: "beacon::diagnostic", error = %e, "shared store push failed");
        }
    }

    /// Pop at most one batch; entries that fail to decode are skipped.
    fn flush(&self) -> Vec<Event> {
        self.pop(self.batch_size)
    }

    fn retain(&self, batch: Vec<Event>) {
        self.overflow.retain(batch);
    }

    fn backend(&self) -> &'static str {
        "shared"
    }

    /// A process-local store dies with the process: move its contents to the
    /// journal. An external store keeps them for the next flush.
    fn spill(&self) -> usize {
        if !self.store.is_process_local() {
            return 0;
        }
        let mut spilled = 0;
        loop {
            let batch = self.pop(self.batch_size.max(1));
            if batch.is_empty() {
                break;
            }
            spilled += batch.len();
            self.overflow.retain(batch);
        }
        if spilled > 0 {
            debug!(count = spilled, "spilling process-local shared list to journal");
        }
        spilled
    }
}

impl SharedBuffer {
    fn pop(&self, count: usize) -> Vec<Event> {
        let raw = match self.store.pop_batch(&self.key, count) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(target: "beacon::diagnostic", error = %e, "shared store pop failed");
                return Vec::new();
            }
        };
        raw.iter()
            .filter_map(|line| match Event::from_json_line(line) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!(target: "beacon::diagnostic", error = %e, "skipping undecodable entry");
                    None
                }
            })
            .collect()
    }
}
