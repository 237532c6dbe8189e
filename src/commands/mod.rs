//! Command Module
//!
//! This module sits between the frame codec and the keyspace: it interprets
//! decoded frames as commands and executes them.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Command         │  (command.rs: validate arity and argument shape)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (handler.rs: execute, build reply)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Keyspace        │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `PING [message]`
//! - `ECHO message`
//! - `SET key value [PX milliseconds]`
//! - `GET key`

pub mod command;
pub mod handler;

pub use command::{Command, CommandError};
pub use handler::{CommandHandler, Processed};
