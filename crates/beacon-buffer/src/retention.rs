//! TTL sweep for rotated journal files.
//!
//! Only rotated files (`events.<unix_ts>.jsonl`) are candidates. The live
//! journal and claimed `.processing` files are never deleted here. Every
//! deletion is logged as a retention event; nothing is removed silently.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{BufferError, Result};
use crate::journal::is_rotated_name;

/// A retention event recording one sweep deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionEvent {
    pub timestamp: DateTime<Utc>,

    /// File name relative to the journal directory.
    pub file_name: String,

    pub size_bytes: u64,

    pub age_secs: u64,

    pub ttl_secs: u64,

    /// Whether this was a dry-run (file not actually deleted).
    pub dry_run: bool,
}

/// A rotated file found during a scan.
#[derive(Debug, Clone)]
pub struct RotatedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

impl RotatedFile {
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.modified)
            .unwrap_or(Duration::ZERO)
    }
}

/// List rotated journal files in `dir`.
pub fn scan_rotated(dir: &Path) -> Result<Vec<RotatedFile>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BufferError::io(dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BufferError::io(dir, e))?;
        let name = entry.file_name();
        if !is_rotated_name(&name.to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            // Raced with a drain claim or another sweep.
            _ => continue,
        };
        files.push(RotatedFile {
            path,
            size_bytes: metadata.len(),
            modified: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
        });
    }
    Ok(files)
}

/// Delete rotated files older than `ttl`. Returns one event per candidate.
pub fn sweep_rotated(dir: &Path, ttl: Duration, dry_run: bool) -> Result<Vec<RetentionEvent>> {
    let now = Utc::now();
    let mut events = Vec::new();

    for file in scan_rotated(dir)? {
        let age = file.age();
        if age <= ttl {
            continue;
        }

        let file_name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let event = RetentionEvent {
            timestamp: now,
            file_name,
            size_bytes: file.size_bytes,
            age_secs: age.as_secs(),
            ttl_secs: ttl.as_secs(),
            dry_run,
        };

        if dry_run {
            info!(
                file = %event.file_name,
                size_bytes = event.size_bytes,
                age_secs = event.age_secs,
                "[DRY-RUN] would sweep rotated journal"
            );
        } else {
            info!(
                file = %event.file_name,
                size_bytes = event.size_bytes,
                age_secs = event.age_secs,
                ttl_secs = event.ttl_secs,
                "sweeping rotated journal"
            );
            match fs::remove_file(&file.path) {
                Ok(()) => debug!("Deleted: {}", file.path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to delete {}: {}", file.path.display(), e),
            }
        }

        events.push(event);
    }

    Ok(events)
}
