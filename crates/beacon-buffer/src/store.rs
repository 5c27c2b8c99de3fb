//! Key-value list store seam for the shared backend.
//!
//! The shared backend pushes to the head of a bounded list and pops from the
//! tail, so the list behaves as a FIFO across every process that uses it.
//! Atomicity is delegated to the store's native list operations.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::StoreError;

/// Minimal list + TTL key operations the shared backend and throttle need.
pub trait ListStore: Send + Sync {
    /// Push to the head and trim the list to `max_len` entries (oldest dropped).
    fn push_trim(&self, key: &str, value: &str, max_len: usize) -> Result<(), StoreError>;

    /// Pop up to `count` entries from the tail, oldest first.
    fn pop_batch(&self, key: &str, count: usize) -> Result<Vec<String>, StoreError>;

    fn len(&self, key: &str) -> Result<usize, StoreError>;

    /// Set a plain key that expires after `ttl`.
    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Whether the data lives in this process and dies with it.
    fn is_process_local(&self) -> bool {
        false
    }
}

/// Store kept in process memory. Used for tests and single-process hosts.
#[derive(Debug, Default)]
pub struct InProcessListStore {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    keys: Mutex<HashMap<String, (String, Instant)>>,
}

impl InProcessListStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lists(&self) -> MutexGuard<'_, HashMap<String, VecDeque<String>>> {
        self.lists.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn keys(&self) -> MutexGuard<'_, HashMap<String, (String, Instant)>> {
        self.keys.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl ListStore for InProcessListStore {
    fn push_trim(&self, key: &str, value: &str, max_len: usize) -> Result<(), StoreError> {
        let mut lists = self.lists();
        let list = lists.entry(key.to_string()).or_default();
        list.push_front(value.to_string());
        list.truncate(max_len);
        Ok(())
    }

    fn pop_batch(&self, key: &str, count: usize) -> Result<Vec<String>, StoreError> {
        let mut lists = self.lists();
        let Some(list) = lists.get_mut(key) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(count.min(list.len()));
        while out.len() < count {
            match list.pop_back() {
                Some(v) => out.push(v),
                None => break,
            }
        }
        Ok(out)
    }

    fn len(&self, key: &str) -> Result<usize, StoreError> {
        Ok(self.lists().get(key).map_or(0, VecDeque::len))
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.keys()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut keys = self.keys();
        match keys.get(key) {
            Some((value, expires)) if Instant::now() < *expires => Ok(Some(value.clone())),
            Some(_) => {
                keys.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn is_process_local(&self) -> bool {
        true
    }
}

/// Redis-backed store (`LPUSH`+`LTRIM`, `RPOP count`, `SET EX`, `GET`).
#[cfg(feature = "redis")]
pub struct RedisListStore {
    conn: Mutex<redis::Connection>,
}

#[cfg(feature = "redis")]
impl RedisListStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1/`).
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_with_timeout(timeout)?;
        conn.set_read_timeout(Some(timeout))?;
        conn.set_write_timeout(Some(timeout))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, redis::Connection> {
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(feature = "redis")]
impl ListStore for RedisListStore {
    fn push_trim(&self, key: &str, value: &str, max_len: usize) -> Result<(), StoreError> {
        let stop = max_len.saturating_sub(1) as isize;
        redis::pipe()
            .atomic()
            .cmd("LPUSH")
            .arg(key)
            .arg(value)
            .ignore()
            .cmd("LTRIM")
            .arg(key)
            .arg(0)
            .arg(stop)
            .ignore()
            .query::<()>(&mut *self.conn())?;
        Ok(())
    }

    fn pop_batch(&self, key: &str, count: usize) -> Result<Vec<String>, StoreError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let values: Option<Vec<String>> = redis::cmd("RPOP")
            .arg(key)
            .arg(count)
            .query(&mut *self.conn())?;
        Ok(values.unwrap_or_default())
    }

    fn len(&self, key: &str) -> Result<usize, StoreError> {
        Ok(redis::cmd("LLEN").arg(key).query(&mut *self.conn())?)
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query::<()>(&mut *self.conn())?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(redis::cmd("GET").arg(key).query(&mut *self.conn())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_across_push_and_pop() {
        let store = InProcessListStore::new();
        for v in ["a", "b", "c"] {
            store.push_trim("k", v, 10).unwrap();
        }
        assert_eq!(store.pop_batch("k", 2).unwrap(), vec!["a", "b"]);
        assert_eq!(store.pop_batch("k", 5).unwrap(), vec!["c"]);
        assert!(store.pop_batch("k", 5).unwrap().is_empty());
    }

    #[test]
    fn test_trim_drops_oldest() {
        let store = InProcessListStore::new();
        for n in 0..5 {
            store.push_trim("k", &n.to_string(), 3).unwrap();
        }
        assert_eq!(store.len("k").unwrap(), 3);
        assert_eq!(store.pop_batch("k", 3).unwrap(), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_ttl_key_expires() {
        let store = InProcessListStore::new();
        store.set_with_ttl("t", "1", Duration::from_secs(60)).unwrap();
        assert_eq!(store.get("t").unwrap().as_deref(), Some("1"));

        store.set_with_ttl("t", "1", Duration::ZERO).unwrap();
        assert_eq!(store.get("t").unwrap(), None);
    }
}
