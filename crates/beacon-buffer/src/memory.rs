//! Bounded in-process buffer with journal fallback.

use std::sync::{Arc, Mutex, MutexGuard};

use beacon_common::Event;
use tracing::debug;

use crate::journal::JournalBuffer;
use crate::Buffer;

/// In-process ordered buffer.
///
/// Pushes past `capacity` go straight to the overflow journal instead of
/// growing the list, so nothing is lost silently.
#[derive(Debug)]
pub struct MemoryBuffer {
    events: Mutex<Vec<Event>>,
    capacity: usize,
    overflow: Arc<JournalBuffer>,
}

impl MemoryBuffer {
    pub fn new(capacity: usize, overflow: Arc<JournalBuffer>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            capacity,
            overflow,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overflow(&self) -> &Arc<JournalBuffer> {
        &self.overflow
    }

    fn events(&self) -> MutexGuard<'_, Vec<Event>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.events.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Buffer for MemoryBuffer {
    fn push(&self, event: Event) {
        let overflowed = {
            let mut events = self.events();
            if events.len() < self.capacity {
                events.push(event);
                None
            } else {
                Some(event)
            }
        };

        if let Some(event) = overflowed {
            debug!(capacity = self.capacity, "memory buffer full; writing to journal");
            self.overflow.push(event);
        }
    }

    fn flush(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events())
    }

    fn retain(&self, batch: Vec<Event>) {
        self.overflow.retain(batch);
    }

    fn backend(&self) -> &'static str {
        "memory"
    }

    /// Write everything still buffered to the journal without sending.
    fn spill(&self) -> usize {
        let batch = self.flush();
        let count = batch.len();
        if count > 0 {
            debug!(count, "spilling memory buffer to journal");
            self.overflow.retain(batch);
        }
        count
    }
}
