//! Polling drain daemon.
//!
//! Runs [`Drainer`] passes back to back with a sleep in between. The sleep
//! is sliced so a stop request (SIGINT/SIGTERM or a caller-owned flag) is
//! noticed within [`STOP_POLL`]. A pass that finds the journal held by
//! another drain is logged and skipped; the next pass tries again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use beacon_buffer::JournalBuffer;
use beacon_common::Deliver;
use serde::Serialize;

use crate::drain::{DrainError, DrainOptions, DrainStatus, Drainer};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};

/// Granularity of the interruptible sleep.
pub const STOP_POLL: Duration = Duration::from_millis(200);

static SIGNALLED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_signal(_signum: libc::c_int) {
    SIGNALLED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to [`stop_requested`].
pub fn install_signal_handlers() {
    #[cfg(unix)]
    {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
        unsafe {
            libc::signal(libc::SIGINT, handler);
            libc::signal(libc::SIGTERM, handler);
        }
    }
}

/// Whether a termination signal has arrived since startup.
pub fn stop_requested() -> bool {
    SIGNALLED.load(Ordering::SeqCst)
}

#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub interval: Duration,
    /// Stop after this many passes (`None` runs until signalled).
    pub max_runs: Option<u64>,
    pub drain: DrainOptions,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        DaemonOptions {
            interval: Duration::from_secs(60),
            max_runs: None,
            drain: DrainOptions::default(),
        }
    }
}

/// Totals across every pass of one daemon run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DaemonSummary {
    pub passes: u64,
    pub events_sent: usize,
    pub events_rejected: usize,
    pub failed_passes: u64,
    pub skipped_passes: u64,
}

pub struct Daemon<'a> {
    journal: &'a JournalBuffer,
    sender: &'a dyn Deliver,
    options: DaemonOptions,
    log: &'a LogContext,
}

impl<'a> Daemon<'a> {
    pub fn new(
        journal: &'a JournalBuffer,
        sender: &'a dyn Deliver,
        options: DaemonOptions,
        log: &'a LogContext,
    ) -> Self {
        Daemon {
            journal,
            sender,
            options,
            log,
        }
    }

    /// Loop until `stop` is set, a signal arrives, or `max_runs` passes ran.
    pub fn run(&self, stop: &AtomicBool) -> DaemonSummary {
        let should_stop = || stop.load(Ordering::SeqCst) || stop_requested();
        let mut summary = DaemonSummary::default();

        log_event!(
            self.log,
            INFO,
            event_names::DAEMON_STARTED,
            Stage::Daemon,
            "drain daemon started",
            interval_secs = self.options.interval.as_secs(),
            journal = tracing::field::display(self.journal.dir().display())
        );

        while !should_stop() {
            self.pass(&mut summary);
            if self.options.max_runs.is_some_and(|max| summary.passes >= max) {
                break;
            }
            self.sleep(&should_stop);
        }

        log_event!(
            self.log,
            INFO,
            event_names::DAEMON_STOPPED,
            Stage::Daemon,
            "drain daemon stopped",
            passes = summary.passes,
            events_sent = summary.events_sent
        );
        summary
    }

    fn pass(&self, summary: &mut DaemonSummary) {
        summary.passes += 1;
        let drainer = Drainer::new(self.journal, self.sender, self.options.drain.clone());
        match drainer.run() {
            Ok(report) => {
                summary.events_sent += report.events_sent;
                summary.events_rejected += report.events_rejected;
                if report.status == DrainStatus::Failed {
                    summary.failed_passes += 1;
                }
                if report.status != DrainStatus::Empty {
                    log_event!(
                        self.log,
                        INFO,
                        event_names::DAEMON_PASS,
                        Stage::Daemon,
                        "drain pass finished",
                        pass = summary.passes,
                        events_sent = report.events_sent,
                        events_requeued = report.events_requeued
                    );
                }
            }
            Err(DrainError::LockHeld { files }) => {
                summary.skipped_passes += 1;
                log_event!(
                    self.log,
                    WARN,
                    event_names::DRAIN_LOCK_HELD,
                    Stage::Daemon,
                    "journal held by another drain; skipping pass",
                    processing_files = files.len()
                );
            }
            Err(e) => {
                summary.failed_passes += 1;
                log_event!(
                    self.log,
                    ERROR,
                    event_names::INTERNAL_ERROR,
                    Stage::Daemon,
                    "drain pass failed",
                    error = tracing::field::display(&e)
                );
            }
        }
    }

    fn sleep(&self, should_stop: &dyn Fn() -> bool) {
        let deadline = Instant::now() + self.options.interval;
        loop {
            let now = Instant::now();
            if now >= deadline || should_stop() {
                return;
            }
            thread::sleep(STOP_POLL.min(deadline - now));
        }
    }
}
