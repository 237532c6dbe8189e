//! # respkv - A Small RESP Key-Value Store
//!
//! respkv speaks the Redis Serialization Protocol (RESP) and keeps an
//! in-memory keyspace with optional per-key expiry.
//!
//! ## Architecture
//!
//! ```text
//! raw bytes
//!     │
//!     ▼
//! ┌──────────────┐   RespValue   ┌──────────────┐   Command   ┌────────────────┐
//! │ Frame codec  │──────────────>│ Command      │────────────>│ CommandHandler │
//! │ (protocol)   │               │ parser       │             │ (executor)     │
//! └──────────────┘               └──────────────┘             └───────┬────────┘
//!     ▲                                                               │ get / set
//!     │ reply RespValue                                               ▼
//!     └──────────────────────────────────────────────────────  ┌────────────┐
//!                                                              │  Keyspace  │
//!                                                              └────────────┘
//! ```
//!
//! The codec and command parser are pure functions. The keyspace is the only
//! shared mutable state, behind a single lock that is held for one
//! operation at a time.
//!
//! ## Quick Start
//!
//! ```
//! use respkv::{CommandHandler, Keyspace, RespParser};
//! use std::sync::Arc;
//!
//! let handler = CommandHandler::new(Arc::new(Keyspace::new()));
//! let mut parser = RespParser::new();
//!
//! let out = handler.process(&mut parser, b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
//! assert_eq!(out.output, b"+OK\r\n");
//!
//! let out = handler.process(&mut parser, b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n");
//! assert_eq!(out.output, b"$3\r\nbar\r\n");
//! ```
//!
//! ## Supported Commands
//!
//! - `PING [message]`
//! - `ECHO message`
//! - `SET key value [PX milliseconds]`
//! - `GET key`
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP value types, encoder and incremental decoder
//! - [`commands`]: command parsing and execution
//! - [`storage`]: the keyspace, clocks and the optional expiry sweeper
//! - [`connection`]: per-client read/execute/write loop
//! - [`config`]: server configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{Command, CommandError, CommandHandler};
pub use config::ServerConfig;
pub use connection::{handle_connection, ConnectionLimits, ConnectionStats};
pub use protocol::{decode, ParseError, RespParser, RespValue};
pub use storage::{ExpiryConfig, ExpirySweeper, Keyspace};

/// The default port respkv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host respkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of respkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
