//! Append-only JSONL journal: the disk backend.
//!
//! Layout of the journal directory:
//!
//! ```text
//! events.jsonl                      live journal (appends go here)
//! events.<unix_ts>.jsonl            rotated journals, swept after the TTL
//! events.<unix_ts>-<n>.jsonl        rotation in the same second
//! <name>.processing                 claimed by a running drain
//! .events.lock                      advisory lock file
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use beacon_common::{Deliver, DeliveryOutcome, Event};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{BufferError, Result};
use crate::lock::JournalLock;
use crate::retention::{scan_rotated, sweep_rotated, RetentionEvent};
use crate::Buffer;

/// Live journal file name.
pub const LIVE_FILE: &str = "events.jsonl";
/// Lock file name.
pub const LOCK_FILE: &str = ".events.lock";
/// Suffix added to a journal file claimed by a drain.
pub const PROCESSING_SUFFIX: &str = ".processing";

const PREFIX: &str = "events.";
const EXTENSION: &str = ".jsonl";

/// Journal tuning.
#[derive(Debug, Clone)]
pub struct JournalOptions {
    /// Rotate the live file once it reaches this many bytes.
    pub max_file_bytes: u64,
    /// Rotated files older than this are swept.
    pub rotated_ttl: Duration,
    /// Chance that an append also runs a sweep.
    pub sweep_probability: f64,
}

impl Default for JournalOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024,
            rotated_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            sweep_probability: 0.01,
        }
    }
}

/// Snapshot of the journal directory for `beacon status`.
#[derive(Debug, Clone, Serialize)]
pub struct JournalStatus {
    pub dir: PathBuf,
    pub live_bytes: u64,
    pub live_lines: usize,
    pub rotated_files: usize,
    pub rotated_bytes: u64,
    pub processing_files: Vec<String>,
}

/// Durable append-only journal.
#[derive(Debug, Clone)]
pub struct JournalBuffer {
    dir: PathBuf,
    options: JournalOptions,
}

impl JournalBuffer {
    pub fn new(dir: impl Into<PathBuf>, options: JournalOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn options(&self) -> &JournalOptions {
        &self.options
    }

    pub fn live_path(&self) -> PathBuf {
        self.dir.join(LIVE_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| BufferError::io(&self.dir, e))
    }

    /// Block until the journal lock is held.
    pub fn lock(&self) -> Result<JournalLock> {
        self.ensure_dir()?;
        JournalLock::acquire(&self.lock_path())
    }

    /// Append events, one line each. Returns the number of lines written.
    ///
    /// Events that fail to serialize are skipped.
    pub fn append(&self, events: &[Event]) -> Result<usize> {
        let mut data = String::new();
        let mut written = 0;
        for event in events {
            match event.to_json_line() {
                Ok(line) => {
                    data.push_str(&line);
                    data.push('\n');
                    written += 1;
                }
                Err(e) => debug!(
                    target: "beacon::diagnostic",
                    event_id = %event.id,
                    error = %e,
                    "skipping unserializable event"
                ),
            }
        }
        if written == 0 {
            return Ok(0);
        }

        self.append_raw(&data)?;
        self.maybe_sweep();
        Ok(written)
    }

    /// Append pre-serialized journal lines verbatim (used to requeue).
    pub fn append_lines<I, S>(&self, lines: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut data = String::new();
        let mut written = 0;
        for line in lines {
            let line = line.as_ref().trim_end_matches(&['\r', '\n'][..]);
            if line.trim().is_empty() {
                continue;
            }
            data.push_str(line);
            data.push('\n');
            written += 1;
        }
        if written > 0 {
            self.append_raw(&data)?;
        }
        Ok(written)
    }

    fn append_raw(&self, data: &str) -> Result<()> {
        let _lock = self.lock()?;
        let path = self.live_path();

        let len = {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| BufferError::io(&path, e))?;
            file.write_all(data.as_bytes())
                .map_err(|e| BufferError::io(&path, e))?;
            file.metadata().map_err(|e| BufferError::io(&path, e))?.len()
        };

        if len >= self.options.max_file_bytes {
            self.rotate_locked()?;
        }
        Ok(())
    }

    /// Rotate the live journal now if it has content.
    pub fn rotate(&self) -> Result<Option<PathBuf>> {
        let _lock = self.lock()?;
        self.rotate_locked()
    }

    fn rotate_locked(&self) -> Result<Option<PathBuf>> {
        let live = self.live_path();
        match fs::metadata(&live) {
            Ok(m) if m.len() > 0 => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BufferError::io(&live, e)),
        }

        let target = self.next_rotated_path();
        fs::rename(&live, &target).map_err(|e| BufferError::io(&live, e))?;
        info!(rotated = %target.display(), "journal rotated");
        Ok(Some(target))
    }

    fn next_rotated_path(&self) -> PathBuf {
        self.rotated_path_at(Utc::now().timestamp())
    }

    /// First free rotated name for `ts`; a name counts as taken while its
    /// claimed `.processing` twin exists.
    fn rotated_path_at(&self, ts: i64) -> PathBuf {
        let free = |p: &PathBuf| !p.exists() && !processing_path(p).exists();
        let first = self.dir.join(format!("{}{}{}", PREFIX, ts, EXTENSION));
        if free(&first) {
            return first;
        }
        (1u32..)
            .map(|n| self.dir.join(format!("{}{}-{}{}", PREFIX, ts, n, EXTENSION)))
            .find(free)
            .unwrap_or(first)
    }

    /// Rotated journal files, oldest first.
    pub fn rotated_files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = scan_rotated(&self.dir)?
            .into_iter()
            .map(|f| f.path)
            .collect();
        files.sort_by_key(|p| {
            p.file_name()
                .and_then(|n| rotated_sort_key(&n.to_string_lossy()))
                .unwrap_or((u64::MAX, u32::MAX))
        });
        Ok(files)
    }

    /// Files currently claimed by a drain.
    pub fn processing_files(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BufferError::io(&self.dir, e)),
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().ends_with(PROCESSING_SUFFIX))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Claim a journal file by renaming it to `<name>.processing` under the lock.
    ///
    /// Returns `None` if the file does not exist or is empty. Writers that
    /// arrive after the claim start a fresh live journal.
    pub fn claim(&self, path: &Path) -> Result<Option<PathBuf>> {
        let _lock = self.lock()?;
        match fs::metadata(path) {
            Ok(m) if m.len() == 0 => {
                let _ = fs::remove_file(path);
                return Ok(None);
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BufferError::io(path, e)),
        }
        let target = processing_path(path);
        fs::rename(path, &target).map_err(|e| BufferError::io(path, e))?;
        Ok(Some(target))
    }

    /// Parse every decodable event in one journal file.
    pub fn read_file(path: &Path) -> Result<Vec<Event>> {
        let file = match fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BufferError::io(path, e)),
        };
        let mut events = Vec::new();
        for (idx, line) in JournalLines::new(BufReader::new(file)).enumerate() {
            let result = match line.map_err(|e| BufferError::io(path, e))? {
                JournalLine::Text(text) => Event::from_json_line(&text).map_err(|e| e.to_string()),
                JournalLine::Invalid => Err("line is not valid UTF-8".to_string()),
            };
            match result {
                Ok(event) => events.push(event),
                Err(e) => debug!(
                    target: "beacon::diagnostic",
                    file = %path.display(),
                    line = idx + 1,
                    error = %e,
                    "skipping undecodable journal line"
                ),
            }
        }
        Ok(events)
    }

    /// All journaled events: rotated files oldest first, then the live file.
    pub fn read_all(&self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for path in self.rotated_files()? {
            events.extend(Self::read_file(&path)?);
        }
        events.extend(Self::read_file(&self.live_path())?);
        Ok(events)
    }

    /// Run the rotated-file TTL sweep now.
    pub fn sweep(&self) -> Result<Vec<RetentionEvent>> {
        sweep_rotated(&self.dir, self.options.rotated_ttl, false)
    }

    fn maybe_sweep(&self) {
        let p = self.options.sweep_probability;
        if p <= 0.0 || rand::random::<f64>() >= p {
            return;
        }
        if let Err(e) = self.sweep() {
            debug!(target: "beacon::diagnostic", error = %e, "journal sweep failed");
        }
    }

    pub fn status(&self) -> Result<JournalStatus> {
        let live = self.live_path();
        let (live_bytes, live_lines) = match fs::File::open(&live) {
            Ok(file) => {
                let bytes = file.metadata().map(|m| m.len()).unwrap_or(0);
                let lines = JournalLines::new(BufReader::new(file))
                    .map_while(|l| l.ok())
                    .count();
                (bytes, lines)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (0, 0),
            Err(e) => return Err(BufferError::io(&live, e)),
        };

        let rotated = scan_rotated(&self.dir)?;
        let processing = self
            .processing_files()?
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect();

        Ok(JournalStatus {
            dir: self.dir.clone(),
            live_bytes,
            live_lines,
            rotated_files: rotated.len(),
            rotated_bytes: rotated.iter().map(|f| f.size_bytes).sum(),
            processing_files: processing,
        })
    }
}

impl Buffer for JournalBuffer {
    fn push(&self, event: Event) {
        if let Err(e) = self.append(std::slice::from_ref(&event)) {
            debug!(target: "beacon::diagnostic", error = %e, "journal append failed");
        }
    }

    /// Delivery is the drain command's job; the journal only holds events.
    fn flush(&self) -> Vec<Event> {
        Vec::new()
    }

    fn retain(&self, batch: Vec<Event>) {
        if let Err(e) = self.append(&batch) {
            debug!(target: "beacon::diagnostic", error = %e, count = batch.len(), "journal append failed");
        }
    }

    fn flush_and_send(&self, _sender: &dyn Deliver) -> DeliveryOutcome {
        DeliveryOutcome::Delivered
    }

    fn backend(&self) -> &'static str {
        "disk"
    }
}

/// One non-blank line of a journal file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalLine {
    /// Line text without the trailing newline.
    Text(String),
    /// Bytes that are not UTF-8, e.g. a torn write.
    Invalid,
}

/// Line reader that keeps going past lines that are not valid UTF-8.
///
/// Blank lines are skipped. Only a failing read ends the stream with an error.
pub struct JournalLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> JournalLines<R> {
    pub fn new(reader: R) -> Self {
        JournalLines {
            reader,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for JournalLines<R> {
    type Item = io::Result<JournalLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
            let mut bytes = self.buf.as_slice();
            while let [rest @ .., b'\n' | b'\r'] = bytes {
                bytes = rest;
            }
            if bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(Ok(match std::str::from_utf8(bytes) {
                Ok(text) => JournalLine::Text(text.to_string()),
                Err(_) => JournalLine::Invalid,
            }));
        }
    }
}

/// `<path>.processing`
pub fn processing_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PROCESSING_SUFFIX);
    PathBuf::from(name)
}

/// Whether a file name is a rotated journal (`events.<ts>[-n].jsonl`).
pub fn is_rotated_name(name: &str) -> bool {
    rotated_sort_key(name).is_some()
}

fn rotated_sort_key(name: &str) -> Option<(u64, u32)> {
    let stem = name.strip_prefix(PREFIX)?.strip_suffix(EXTENSION)?;
    let (ts, n) = match stem.split_once('-') {
        Some((ts, n)) => (ts, n.parse().ok()?),
        None => (stem, 0),
    };
    if ts.is_empty() || !ts.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((ts.parse().ok()?, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_common::{EventId, Payload, TraceId};
    use tempfile::tempdir;

    fn event(n: usize) -> Event {
        Event {
            id: EventId::generate(),
            trace_id: TraceId::generate(),
            session_id: None,
            event_type: "request".to_string(),
            name: format!("GET /items/{}", n),
            payload: Payload::new(),
            context: Payload::new(),
            timestamp: Utc::now(),
            monotonic_ns: n as u64,
            host: "test-host".to_string(),
            memory: 0,
            environment: None,
            release: None,
            enrichment: Payload::new(),
        }
    }

    fn journal(dir: &Path, max_file_bytes: u64) -> JournalBuffer {
        JournalBuffer::new(
            dir,
            JournalOptions {
                max_file_bytes,
                sweep_probability: 0.0,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_rotated_name_parsing() {
        assert!(is_rotated_name("events.1700000000.jsonl"));
        assert!(is_rotated_name("events.1700000000-2.jsonl"));
        assert!(!is_rotated_name("events.jsonl"));
        assert!(!is_rotated_name("events.1700000000.jsonl.processing"));
        assert!(!is_rotated_name("events.abc.jsonl"));
        assert!(!is_rotated_name(".events.lock"));
    }

    #[test]
    fn test_push_appends_one_line_per_event() {
        let dir = tempdir().unwrap();
        let j = journal(dir.path(), u64::MAX);
        j.push(event(1));
        j.push(event(2));

        let content = fs::read_to_string(j.live_path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
        assert!(j.flush().is_empty());
    }

    #[test]
    fn test_rotation_on_size() {
        let dir = tempdir().unwrap();
        let j = journal(dir.path(), 1);
        j.push(event(1));
        j.push(event(2));
        j.push(event(3));

        assert!(!j.live_path().exists());
        let rotated = j.rotated_files().unwrap();
        assert_eq!(rotated.len(), 3);

        let names: Vec<u64> = j
            .read_all()
            .unwrap()
            .iter()
            .map(|e| e.monotonic_ns)
            .collect();
        assert_eq!(names, vec![1, 2, 3]);
    }

    #[test]
    fn test_claim_renames_and_new_writes_go_to_fresh_file() {
        let dir = tempdir().unwrap();
        let j = journal(dir.path(), u64::MAX);
        j.push(event(1));

        let claimed = j.claim(&j.live_path()).unwrap().unwrap();
        assert!(claimed.to_string_lossy().ends_with(".processing"));
        assert!(!j.live_path().exists());

        j.push(event(2));
        assert_eq!(JournalBuffer::read_file(&claimed).unwrap().len(), 1);
        assert_eq!(JournalBuffer::read_file(&j.live_path()).unwrap().len(), 1);
        assert_eq!(j.processing_files().unwrap(), vec![claimed]);
    }

    #[test]
    fn test_claim_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let j = journal(dir.path(), u64::MAX);
        assert!(j.claim(&j.live_path()).unwrap().is_none());
    }

    #[test]
    fn test_undecodable_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let j = journal(dir.path(), u64::MAX);
        j.push(event(1));
        j.append_lines(["{not json"]).unwrap();
        j.push(event(2));

        assert_eq!(j.read_all().unwrap().len(), 2);
        assert_eq!(j.status().unwrap().live_lines, 3);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let j = journal(dir.path(), u64::MAX);
        j.push(event(1));
        fs::OpenOptions::new()
            .append(true)
            .open(j.live_path())
            .unwrap()
            .write_all(b"{\"torn\xff\xfe\n")
            .unwrap();
        j.push(event(2));

        let seqs: Vec<u64> = j.read_all().unwrap().iter().map(|e| e.monotonic_ns).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(j.status().unwrap().live_lines, 3);
    }

    #[test]
    fn test_journal_lines_classifies_each_line() {
        let input: &[u8] = b"a\r\n\n  \n\xffb\nlast";
        let lines: Vec<JournalLine> = JournalLines::new(input).map(|l| l.unwrap()).collect();
        assert_eq!(
            lines,
            vec![
                JournalLine::Text("a".into()),
                JournalLine::Invalid,
                JournalLine::Text("last".into()),
            ]
        );
    }

    #[test]
    fn test_rotated_name_skips_claimed_twin() {
        let dir = tempdir().unwrap();
        let j = journal(dir.path(), u64::MAX);
        let ts = 1_700_000_000;
        fs::write(dir.path().join("events.1700000000.jsonl.processing"), "x\n").unwrap();

        assert_eq!(
            j.rotated_path_at(ts),
            dir.path().join("events.1700000000-1.jsonl")
        );

        fs::write(dir.path().join("events.1700000000-1.jsonl"), "x\n").unwrap();
        assert_eq!(
            j.rotated_path_at(ts),
            dir.path().join("events.1700000000-2.jsonl")
        );
    }

    #[test]
    fn test_status_counts_rotated_and_processing() {
        let dir = tempdir().unwrap();
        let j = journal(dir.path(), u64::MAX);
        j.push(event(1));
        j.rotate().unwrap();
        j.push(event(2));
        j.claim(&j.live_path()).unwrap();

        let status = j.status().unwrap();
        assert_eq!(status.rotated_files, 1);
        assert!(status.rotated_bytes > 0);
        assert_eq!(status.live_bytes, 0);
        assert_eq!(status.processing_files, vec!["events.jsonl.processing"]);
    }
}
