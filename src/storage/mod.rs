//! Keyspace Module
//!
//! This module provides the shared, mutable state of the server: a
//! thread-safe key-value map with per-key absolute expiry, the clock it
//! reads, and an optional background expiry sweeper.
//!
//! ## Features
//!
//! - **Single Lock**: one mutex, held for exactly one `get`/`set`
//! - **TTL Support**: entries may carry an absolute expiry timestamp
//! - **Lazy Expiry**: expired keys are removed when read
//! - **Active Expiry**: optional sweeper removes keys nobody reads
//!
//! ## Example
//!
//! ```
//! use respkv::storage::Keyspace;
//! use bytes::Bytes;
//!
//! let keyspace = Keyspace::new();
//!
//! keyspace.set(Bytes::from("color"), Bytes::from("teal"), None);
//! assert_eq!(keyspace.get(b"color"), Some(Bytes::from("teal")));
//!
//! // Expires one hour from now
//! let expire_at = keyspace.now_ms() + 3_600_000;
//! keyspace.set(Bytes::from("otp"), Bytes::from("482913"), Some(expire_at));
//! ```

pub mod clock;
pub mod engine;
pub mod expiry;

// Re-export commonly used types
pub use clock::{now_ms, Clock, ManualClock, SystemClock};
pub use engine::{KeyEntry, Keyspace, KeyspaceStats};
pub use expiry::{ExpiryConfig, ExpirySweeper};
