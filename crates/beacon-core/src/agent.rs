//! Process-level wiring: one buffer, one recorder, one sender.
//!
//! A host builds an [`Agent`] once from its configuration, records through
//! it for the life of the process, calls [`Agent::flush`] after each
//! request or job, and keeps the [`ShutdownGuard`] from [`Agent::install`]
//! alive until teardown.

use std::ops::Deref;
use std::sync::Arc;

use beacon_buffer::{
    Buffer, InProcessListStore, JournalBuffer, JournalOptions, ListStore, MemoryBuffer,
    SharedBuffer,
};
use beacon_common::{Deliver, DeliveryOutcome, Payload};
use beacon_config::{AgentConfig, BufferBackend, SharedStoreConfig};
use tracing::{debug, warn};

use crate::boundary::fail_open;
use crate::context::TraceContext;
use crate::logging::{event_names, DIAGNOSTIC_TARGET};
use crate::recorder::{DeploymentEnricher, RecordOutcome, Recorder};
use crate::sender::{LocalThrottle, Sender, SharedThrottle, Throttle};

/// Journal tuning from the `buffer.journal` section.
pub fn journal_options(config: &AgentConfig) -> JournalOptions {
    let journal = &config.buffer.journal;
    JournalOptions {
        max_file_bytes: journal.max_file_bytes,
        rotated_ttl: journal.rotated_ttl(),
        sweep_probability: journal.sweep_probability,
    }
}

/// The journal the drain command reads and the memory backend spills to.
pub fn open_journal(config: &AgentConfig) -> JournalBuffer {
    JournalBuffer::new(config.buffer.journal.journal_dir(), journal_options(config))
}

pub struct Agent {
    recorder: Recorder,
    sender: Arc<dyn Deliver>,
    journal: Arc<JournalBuffer>,
}

impl Agent {
    /// Build the configured backend and a production sender.
    ///
    /// Never fails: a shared store that cannot be reached degrades to the
    /// disk journal with a warning.
    pub fn from_config(config: &AgentConfig) -> Self {
        let journal = Arc::new(open_journal(config));
        let (buffer, throttle): (Arc<dyn Buffer>, Arc<dyn Throttle>) = match config.buffer.backend
        {
            BufferBackend::Memory => (
                Arc::new(MemoryBuffer::new(
                    config.buffer.memory_capacity,
                    Arc::clone(&journal),
                )),
                Arc::new(LocalThrottle::new()),
            ),
            BufferBackend::Disk => (journal.clone(), Arc::new(LocalThrottle::new())),
            BufferBackend::Shared => match connect_store(&config.buffer.shared, config) {
                Some(store) => {
                    let shared = &config.buffer.shared;
                    (
                        Arc::new(SharedBuffer::new(
                            Arc::clone(&store),
                            shared.key.clone(),
                            shared.max_len,
                            shared.batch_size,
                            Arc::clone(&journal),
                        )),
                        Arc::new(SharedThrottle::new(store, shared.throttle_key.clone())),
                    )
                }
                None => (journal.clone(), Arc::new(LocalThrottle::new())),
            },
        };

        let sender: Arc<dyn Deliver> = Arc::new(Sender::with_throttle(config, throttle));
        let mut agent = Agent::with_parts(config, buffer, sender, journal);
        if let Ok(cwd) = std::env::current_dir() {
            agent.recorder.add_enricher(DeploymentEnricher::discover(&cwd));
        }
        agent
    }

    /// Assemble from explicit parts (custom buffers, senders in tests).
    pub fn with_parts(
        config: &AgentConfig,
        buffer: Arc<dyn Buffer>,
        sender: Arc<dyn Deliver>,
        journal: Arc<JournalBuffer>,
    ) -> Self {
        debug!(backend = buffer.backend(), "agent initialised");
        Agent {
            recorder: Recorder::new(config, buffer),
            sender,
            journal,
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Register filters and enrichers before the agent is shared.
    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        self.recorder.buffer()
    }

    pub fn sender(&self) -> &Arc<dyn Deliver> {
        &self.sender
    }

    pub fn journal(&self) -> &Arc<JournalBuffer> {
        &self.journal
    }

    pub fn record(
        &self,
        ctx: &TraceContext,
        event_type: &str,
        name: &str,
        payload: Payload,
    ) -> RecordOutcome {
        self.recorder.record(ctx, event_type, name, payload)
    }

    /// Ship what the buffer holds. Meant to run after the response is sent.
    pub fn flush(&self) -> DeliveryOutcome {
        let buffer = self.buffer();
        let sender = self.sender.as_ref();
        fail_open("flush", DeliveryOutcome::Retryable, || {
            buffer.flush_and_send(sender)
        })
    }

    /// Move anything that would die with the process to the journal.
    /// Returns the count moved.
    pub fn shutdown(&self) -> usize {
        let buffer = self.buffer();
        let spilled = fail_open("shutdown", 0, || buffer.spill());
        if spilled > 0 {
            debug!(
                target: event_names::SHUTDOWN_SPILLED,
                spilled,
                "buffered events written to journal"
            );
        }
        spilled
    }

    /// Take ownership and spill on drop.
    pub fn install(self) -> ShutdownGuard {
        ShutdownGuard { agent: self }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("recorder", &self.recorder)
            .field("journal", &self.journal.dir())
            .finish()
    }
}

/// Owns the [`Agent`]; dropping it spills process-local buffers to the journal.
#[derive(Debug)]
pub struct ShutdownGuard {
    agent: Agent,
}

impl Deref for ShutdownGuard {
    type Target = Agent;

    fn deref(&self) -> &Agent {
        &self.agent
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.agent.shutdown();
    }
}

/// Open the shared list store. `None` means fall back to the journal.
fn connect_store(
    shared: &SharedStoreConfig,
    config: &AgentConfig,
) -> Option<Arc<dyn ListStore>> {
    let Some(url) = shared.url.as_deref().filter(|u| !u.trim().is_empty()) else {
        debug!(target: DIAGNOSTIC_TARGET, "no shared store url; using in-process store");
        return Some(Arc::new(InProcessListStore::new()));
    };
    open_remote_store(url, config)
}

#[cfg(feature = "redis")]
fn open_remote_store(url: &str, config: &AgentConfig) -> Option<Arc<dyn ListStore>> {
    match beacon_buffer::RedisListStore::connect(url, config.delivery.timeout()) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!(error = %e, "shared store unreachable; buffering to the disk journal");
            None
        }
    }
}

#[cfg(not(feature = "redis"))]
fn open_remote_store(_url: &str, _config: &AgentConfig) -> Option<Arc<dyn ListStore>> {
    warn!("shared store url set but this build lacks the `redis` feature; buffering to the disk journal");
    None
}
