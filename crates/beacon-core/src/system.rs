//! Host identity and process memory for event assembly.

use std::sync::OnceLock;

/// Host name of this machine, cached for the life of the process.
///
/// Falls back to `HOSTNAME`, then to `"unknown"`.
pub fn hostname() -> String {
    static HOST: OnceLock<String> = OnceLock::new();
    HOST.get_or_init(|| {
        read_uname_nodename()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    })
    .clone()
}

#[cfg(unix)]
fn read_uname_nodename() -> Option<String> {
    // SAFETY: `utsname` is plain old data; uname fills it on success.
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut uts) } != 0 {
        return None;
    }
    // SAFETY: nodename is NUL-terminated after a successful uname.
    let name = unsafe { std::ffi::CStr::from_ptr(uts.nodename.as_ptr()) };
    name.to_str().ok().map(str::to_string)
}

#[cfg(not(unix))]
fn read_uname_nodename() -> Option<String> {
    None
}

/// Resident set size of the current process in bytes, or 0 if unknown.
pub fn resident_memory_bytes() -> u64 {
    std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|s| parse_statm_resident(&s))
        .map(|pages| pages.saturating_mul(page_size()))
        .unwrap_or(0)
}

/// Second field of `/proc/<pid>/statm`: resident pages.
pub fn parse_statm_resident(content: &str) -> Option<u64> {
    content.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(unix)]
fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

#[cfg(not(unix))]
fn page_size() -> u64 {
    4096
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statm() {
        assert_eq!(parse_statm_resident("12345 678 90 1 0 400 0\n"), Some(678));
        assert_eq!(parse_statm_resident("12345"), None);
        assert_eq!(parse_statm_resident(""), None);
        assert_eq!(parse_statm_resident("1 x 3"), None);
    }

    #[test]
    fn test_hostname_is_cached_and_non_empty() {
        let first = hostname();
        assert!(!first.is_empty());
        assert_eq!(first, hostname());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_resident_memory_is_reported() {
        assert!(resident_memory_bytes() > 0);
    }
}
