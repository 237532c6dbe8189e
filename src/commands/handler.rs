//! Command Execution
//!
//! Binds parsed commands to the keyspace and produces exactly one reply per
//! request.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────────┐    ┌───────────┐   │
//! │  │  decode()   │───>│ Command::parse  │───>│   run()   │   │
//! │  └─────────────┘    └─────────────────┘    └─────┬─────┘   │
//! │                                                  │         │
//! │                                                  ▼         │
//! │                                              Keyspace      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Command           | Keyspace effect             | Reply                      |
//! |-------------------|-----------------------------|----------------------------|
//! | `PING`            | none                        | `+PONG`                    |
//! | `PING text`       | none                        | `+text`                    |
//! | `ECHO text`       | none                        | `$len text`                |
//! | `SET k v [PX ms]` | one insert/overwrite        | `+OK`                      |
//! | `GET k`           | removes `k` if expired      | `$len v`, or `$-1`         |
//! | anything else     | none                        | `-ERR unknown command ...` |

use crate::commands::command::{Command, CommandError};
use crate::protocol::{ParseError, RespParser, RespValue};
use crate::storage::Keyspace;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

/// Executes commands against a shared keyspace.
///
/// Cloning is cheap; every connection gets its own clone.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    keyspace: Arc<Keyspace>,
}

/// Result of [`CommandHandler::process`] over a byte buffer.
#[derive(Debug, Default, PartialEq)]
pub struct Processed {
    /// Encoded replies, one per complete request, in request order
    pub output: Vec<u8>,
    /// Bytes of input that were fully handled
    pub consumed: usize,
    /// Number of requests executed
    pub frames: usize,
    /// Set when a malformed frame was hit. `output` then ends with the
    /// error reply for it, and the caller should close the connection.
    pub error: Option<ParseError>,
}

impl CommandHandler {
    /// Creates a new command handler with the given keyspace.
    pub fn new(keyspace: Arc<Keyspace>) -> Self {
        Self { keyspace }
    }

    /// The keyspace this handler reads and writes.
    pub fn keyspace(&self) -> &Arc<Keyspace> {
        &self.keyspace
    }

    /// Parses and executes one request frame.
    ///
    /// Invalid requests become error replies; this never fails.
    pub fn execute(&self, frame: RespValue) -> RespValue {
        match Command::from_frame(frame, self.keyspace.now_ms()) {
            Ok(command) => self.run(command),
            Err(e) => {
                debug!(error = %e, "Rejected command");
                e.to_reply()
            }
        }
    }

    /// Executes a parsed command.
    pub fn run(&self, command: Command) -> RespValue {
        trace!(command = command.name(), "Executing command");

        match command {
            Command::Ping(None) => RespValue::pong(),
            Command::Ping(Some(message)) => ping_reply(message),
            Command::Echo(message) => RespValue::bulk_string(message),
            Command::Set {
                key,
                value,
                expire_at,
            } => {
                self.keyspace.set(key, value, expire_at);
                RespValue::ok()
            }
            Command::Get { key } => RespValue::optional_bulk(self.keyspace.get(&key)),
            Command::Unknown { name, argc } => {
                debug!(command = %name, argc, "Unknown command");
                CommandError::UnknownCommand(name).to_reply()
            }
        }
    }

    /// Decodes and executes every complete request at the front of `input`.
    ///
    /// Trailing bytes that only form part of a frame are left unconsumed so
    /// the caller can retry once more data arrives. Decoding stops at the
    /// first malformed frame.
    ///
    /// # Example
    ///
    /// ```
    /// use respkv::commands::CommandHandler;
    /// use respkv::protocol::RespParser;
    /// use respkv::storage::Keyspace;
    /// use std::sync::Arc;
    ///
    /// let handler = CommandHandler::new(Arc::new(Keyspace::new()));
    /// let mut parser = RespParser::new();
    ///
    /// let processed = handler.process(&mut parser, b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPI");
    /// assert_eq!(processed.output, b"+PONG\r\n");
    /// assert_eq!(processed.consumed, 14);
    /// assert!(processed.error.is_none());
    /// ```
    pub fn process(&self, parser: &mut RespParser, input: &[u8]) -> Processed {
        let mut processed = Processed::default();

        loop {
            match parser.parse(&input[processed.consumed..]) {
                Ok(Some((frame, used))) => {
                    processed.consumed += used;
                    processed.frames += 1;
                    self.execute(frame)
                        .serialize_into(&mut processed.output);
                }
                Ok(None) => break,
                Err(e) => {
                    RespValue::error(format!("ERR Protocol error: {}", e))
                        .serialize_into(&mut processed.output);
                    processed.error = Some(e);
                    break;
                }
            }
        }

        processed
    }
}

/// PING's reply echoes the argument as a simple string when it can be one.
fn ping_reply(message: Bytes) -> RespValue {
    match std::str::from_utf8(&message) {
        Ok(text) if !text.contains(['\r', '\n']) => RespValue::simple_string(text),
        _ => RespValue::bulk_string(message),
    }
}
