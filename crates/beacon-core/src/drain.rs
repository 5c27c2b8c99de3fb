//! Out-of-process journal uploader.
//!
//! A drain pass claims journal files by renaming them to `*.processing`
//! (writers that arrive later start a fresh live journal), streams each one
//! line by line, and ships fixed-size batches through a [`Deliver`].
//! Rotated files go first, oldest first, then the live journal.
//!
//! A permanently rejected batch is dropped and the pass continues. Any other
//! failure stops the pass: the failed batch and every line not yet read are
//! appended back to the live journal and the processing file is removed, so
//! nothing is stranded.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use beacon_buffer::{BufferError, JournalBuffer, JournalLine, JournalLines};
use beacon_common::{Deliver, DeliveryOutcome, Event};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::boundary::fail_open;
use crate::exit_codes::ExitCode;
use crate::logging::{event_names, DIAGNOSTIC_TARGET};

#[derive(Debug, Error)]
pub enum DrainError {
    /// Processing files exist; another drain is running or one died mid-pass.
    #[error("journal is being drained by another process ({} processing file(s))", files.len())]
    LockHeld { files: Vec<PathBuf> },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

impl DrainError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            DrainError::LockHeld { .. } | DrainError::Buffer(BufferError::LockUnavailable(_)) => {
                ExitCode::LockError
            }
            DrainError::Io { .. } | DrainError::Buffer(BufferError::Io { .. }) => ExitCode::IoError,
            DrainError::Buffer(_) => ExitCode::InternalError,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrainOptions {
    pub batch_size: usize,
    /// Adopt processing files left by another (presumably dead) drain.
    pub force: bool,
}

impl Default for DrainOptions {
    fn default() -> Self {
        DrainOptions {
            batch_size: 100,
            force: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainStatus {
    /// Nothing to drain.
    #[default]
    Empty,
    /// Every batch delivered.
    Clean,
    /// Finished, but some batches were rejected and dropped.
    Partial,
    /// Stopped on a delivery failure; the remainder was requeued.
    Failed,
}

/// Summary of one pass, printed by `beacon drain`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DrainReport {
    pub status: DrainStatus,
    pub files_drained: usize,
    pub batches_sent: usize,
    pub events_sent: usize,
    pub batches_rejected: usize,
    pub events_rejected: usize,
    pub events_requeued: usize,
    pub lines_skipped: usize,
    /// Outcome that stopped the pass, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<DeliveryOutcome>,
}

impl DrainReport {
    fn finish(mut self) -> Self {
        self.status = if self.failure.is_some() {
            DrainStatus::Failed
        } else if self.batches_rejected > 0 {
            DrainStatus::Partial
        } else if self.files_drained == 0 {
            DrainStatus::Empty
        } else {
            DrainStatus::Clean
        };
        self
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.status {
            DrainStatus::Empty | DrainStatus::Clean => ExitCode::Clean,
            DrainStatus::Partial => ExitCode::Partial,
            DrainStatus::Failed => ExitCode::DeliveryFailed,
        }
    }
}

pub struct Drainer<'a> {
    journal: &'a JournalBuffer,
    sender: &'a dyn Deliver,
    options: DrainOptions,
}

impl<'a> Drainer<'a> {
    pub fn new(journal: &'a JournalBuffer, sender: &'a dyn Deliver, options: DrainOptions) -> Self {
        Drainer {
            journal,
            sender,
            options,
        }
    }

    /// One pass over the journal.
    pub fn run(&self) -> Result<DrainReport, DrainError> {
        let orphaned = self.journal.processing_files()?;
        if !orphaned.is_empty() && !self.options.force {
            warn!(
                target: event_names::DRAIN_LOCK_HELD,
                files = orphaned.len(),
                "processing files present; use --force if no other drain is running"
            );
            return Err(DrainError::LockHeld { files: orphaned });
        }

        let mut report = DrainReport::default();
        for path in orphaned {
            if !self.drain_file(&path, &mut report)? {
                return Ok(report.finish());
            }
        }

        let mut candidates = self.journal.rotated_files()?;
        candidates.push(self.journal.live_path());
        for path in candidates {
            let Some(claimed) = self.journal.claim(&path)? else {
                continue;
            };
            if !self.drain_file(&claimed, &mut report)? {
                break;
            }
        }
        Ok(report.finish())
    }

    /// Drain one claimed file. `Ok(false)` means the pass must stop.
    fn drain_file(&self, path: &Path, report: &mut DrainReport) -> Result<bool, DrainError> {
        info!(target: event_names::DRAIN_FILE_CLAIMED, file = %path.display(), "draining");
        report.files_drained += 1;

        let io_err = |source| DrainError::Io {
            path: path.to_path_buf(),
            source,
        };
        let batch_size = self.options.batch_size.max(1);
        let mut lines = JournalLines::new(BufReader::new(File::open(path).map_err(io_err)?));
        let mut raw: Vec<String> = Vec::with_capacity(batch_size);
        let mut events: Vec<Event> = Vec::with_capacity(batch_size);

        loop {
            let next = lines.next().transpose().map_err(io_err)?;
            let at_end = next.is_none();
            match next {
                Some(JournalLine::Text(line)) => match Event::from_json_line(&line) {
                    Ok(event) => {
                        events.push(event);
                        raw.push(line);
                    }
                    Err(e) => {
                        report.lines_skipped += 1;
                        debug!(target: DIAGNOSTIC_TARGET, error = %e, "skipping undecodable line");
                    }
                },
                Some(JournalLine::Invalid) => {
                    report.lines_skipped += 1;
                    debug!(target: DIAGNOSTIC_TARGET, "skipping line that is not valid UTF-8");
                }
                None => {}
            }

            if events.len() >= batch_size || (at_end && !events.is_empty()) {
                let outcome = fail_open("drain.send", DeliveryOutcome::Retryable, || {
                    self.sender.deliver(&events)
                });
                match outcome {
                    DeliveryOutcome::Delivered => {
                        report.batches_sent += 1;
                        report.events_sent += events.len();
                        debug!(
                            target: event_names::DRAIN_BATCH_SENT,
                            count = events.len(),
                            "batch delivered"
                        );
                    }
                    DeliveryOutcome::Rejected => {
                        report.batches_rejected += 1;
                        report.events_rejected += events.len();
                        warn!(
                            target: event_names::DRAIN_BATCH_REJECTED,
                            count = events.len(),
                            "batch rejected by collector; dropped"
                        );
                    }
                    failed => {
                        for line in lines.by_ref().map_while(Result::ok) {
                            match line {
                                JournalLine::Text(text) => raw.push(text),
                                JournalLine::Invalid => report.lines_skipped += 1,
                            }
                        }
                        let requeued = self.journal.append_lines(&raw)?;
                        fs::remove_file(path).map_err(io_err)?;
                        report.events_requeued += requeued;
                        report.failure = Some(failed);
                        warn!(
                            target: event_names::DRAIN_REQUEUED,
                            outcome = %failed,
                            requeued,
                            "delivery failed; remaining lines returned to the journal"
                        );
                        return Ok(false);
                    }
                }
                raw.clear();
                events.clear();
            }

            if at_end {
                break;
            }
        }

        fs::remove_file(path).map_err(io_err)?;
        Ok(true)
    }
}
