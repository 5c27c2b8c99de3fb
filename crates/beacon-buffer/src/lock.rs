//! Advisory exclusive lock guarding the journal directory.
//!
//! Every writer, the rotation step and the drain claim take this lock, so
//! lines from concurrent processes never interleave and a rename never races
//! an in-progress append.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::{BufferError, Result};

/// Held lock on the journal lock file. Released on drop.
#[derive(Debug)]
pub struct JournalLock {
    file: File,
}

impl JournalLock {
    /// Block until the exclusive lock is held.
    pub fn acquire(path: &Path) -> Result<Self> {
        Self::lock(path, false)
    }

    /// Take the lock only if nobody else holds it.
    pub fn try_acquire(path: &Path) -> Result<Self> {
        Self::lock(path, true)
    }

    fn lock(path: &Path, nonblocking: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false) // Keep lock file contents (advisory lock only)
            .open(path)
            .map_err(|e| BufferError::io(path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let mut op = libc::LOCK_EX;
            if nonblocking {
                op |= libc::LOCK_NB;
            }
            let result = unsafe { libc::flock(file.as_raw_fd(), op) };

            if result != 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return Err(BufferError::LockUnavailable(path.to_path_buf()));
                }
                return Err(BufferError::io(path, err));
            }
        }
        #[cfg(not(unix))]
        let _ = nonblocking;

        file.set_len(0).map_err(|e| BufferError::io(path, e))?;
        let mut writer = &file;
        let _ = writer.write_all(format!("{}", std::process::id()).as_bytes());

        Ok(Self { file })
    }
}

impl Drop for JournalLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        // The lock file itself stays: removing it would let a waiter lock a
        // deleted inode while a newcomer creates a fresh file.
    }
}
