//! Thread-Safe Keyspace with Expiry Support
//!
//! This module implements the keyspace: a map from key to value with an
//! optional absolute expiry time.
//!
//! ## Design Decisions
//!
//! 1. **Single Lock**: One `parking_lot::Mutex` guards the whole map. Every
//!    operation takes it once, for the duration of that operation only.
//! 2. **Lazy Expiry**: A `get` that finds an entry whose expiry is strictly
//!    in the past removes it and reports the key as absent.
//! 3. **Injected Clock**: The current time comes from a [`Clock`], so expiry
//!    is testable without sleeping.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │ connection 1 │  │ connection 2 │  │ connection N │
//! └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
//!        │   get / set     │                 │
//!        ▼                 ▼                 ▼
//! ┌─────────────────────────────────────────────────┐
//! │                    Keyspace                     │
//! │         Mutex<HashMap<Bytes, KeyEntry>>         │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! The lock is never held across an `.await`: callers get owned `Bytes`
//! back, and `Bytes` clones share the payload instead of copying it.

use crate::storage::clock::{Clock, SystemClock};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// A stored value with an optional absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    /// The actual value stored
    pub value: Bytes,
    /// Milliseconds since the UNIX epoch after which the entry is gone
    /// (None = never expires)
    pub expire_at: Option<u64>,
}

impl KeyEntry {
    pub fn new(value: Bytes, expire_at: Option<u64>) -> Self {
        Self { value, expire_at }
    }

    /// Checks if this entry has expired at time `now`.
    ///
    /// An entry is still visible during the millisecond it expires at.
    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        self.expire_at.is_some_and(|exp| exp < now)
    }
}

/// Snapshot of keyspace counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyspaceStats {
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    /// Entries removed by a `get` that found them expired
    pub lazily_expired: u64,
    /// Entries removed by [`Keyspace::purge_expired`]
    pub actively_expired: u64,
}

/// The shared key-value map.
///
/// Wrap it in an `Arc` and hand a clone to every connection; all methods
/// take `&self`.
///
/// # Example
///
/// ```
/// use respkv::storage::{Keyspace, ManualClock};
/// use bytes::Bytes;
/// use std::sync::Arc;
///
/// let clock = Arc::new(ManualClock::new(1_000));
/// let keyspace = Keyspace::with_clock(clock.clone());
///
/// keyspace.set(Bytes::from("otp"), Bytes::from("482913"), Some(1_100));
/// assert_eq!(keyspace.get(b"otp"), Some(Bytes::from("482913")));
///
/// clock.advance(101);
/// assert_eq!(keyspace.get(b"otp"), None);
/// assert!(keyspace.is_empty());
/// ```
pub struct Keyspace {
    entries: Mutex<HashMap<Bytes, KeyEntry>>,

    clock: Arc<dyn Clock>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: keys removed on read
    lazy_expired_count: AtomicU64,

    /// Statistics: keys removed by the sweeper
    active_expired_count: AtomicU64,
}

impl std::fmt::Debug for Keyspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyspace")
            .field("keys", &self.len())
            .field("clock", &self.clock)
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyspace {
    /// Creates an empty keyspace driven by the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty keyspace driven by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            lazy_expired_count: AtomicU64::new(0),
            active_expired_count: AtomicU64::new(0),
        }
    }

    /// Current time according to this keyspace's clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Inserts or overwrites `key`.
    ///
    /// The previous entry, including its expiry, is replaced wholesale.
    pub fn set(&self, key: Bytes, value: Bytes, expire_at: Option<u64>) {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        trace!(key_len = key.len(), value_len = value.len(), ?expire_at, "set");

        self.entries
            .lock()
            .insert(key, KeyEntry::new(value, expire_at));
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. An expired
    /// entry is removed before returning.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => {}
        }

        entries.remove(key);
        drop(entries);

        self.lazy_expired_count.fetch_add(1, Ordering::Relaxed);
        trace!(key_len = key.len(), "expired on read");
        None
    }

    /// Removes every expired entry and returns how many were removed.
    ///
    /// Only the background sweeper calls this; correctness never depends
    /// on it running.
    pub fn purge_expired(&self) -> u64 {
        let now = self.clock.now_ms();
        let removed = {
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            (before - entries.len()) as u64
        };

        if removed > 0 {
            self.active_expired_count
                .fetch_add(removed, Ordering::Relaxed);
        }
        removed
    }

    /// Returns the number of stored entries, including expired ones that
    /// have not been removed yet.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the keyspace holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns keyspace statistics.
    pub fn stats(&self) -> KeyspaceStats {
        KeyspaceStats {
            keys: self.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            lazily_expired: self.lazy_expired_count.load(Ordering::Relaxed),
            actively_expired: self.active_expired_count.load(Ordering::Relaxed),
        }
    }
}
