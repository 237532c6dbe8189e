//! RESP Protocol Implementation
//!
//! This module is the frame codec: it knows how RESP values look on the
//! wire and nothing about commands.
//!
//! ## Modules
//!
//! - `types`: Defines the `RespValue` enum and serialization
//! - `parser`: Incremental parser for incoming RESP data
//!
//! ## Example
//!
//! ```
//! use respkv::protocol::{parse_message, RespValue};
//! use bytes::Bytes;
//!
//! // Parsing incoming data
//! let data = b"*2\r\n$3\r\nGET\r\n$5\r\nfruit\r\n";
//! let (value, consumed) = parse_message(data).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//!
//! // Creating responses
//! let response = RespValue::bulk_string(Bytes::from("bar"));
//! assert_eq!(response.serialize(), b"$3\r\nbar\r\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{decode, parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
