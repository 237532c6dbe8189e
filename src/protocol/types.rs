//! RESP Values and Encoding
//!
//! A [`RespValue`] is one frame. Line-based frames (simple strings, errors,
//! integers, and every header) end at the first CRLF; bulk string payloads are
//! length-prefixed and carry arbitrary bytes.
//!
//! ```text
//! +OK\r\n                      SimpleString("OK")
//! -ERR syntax error\r\n        Error("ERR syntax error")
//! :42\r\n                      Integer(42)
//! $3\r\nfoo\r\n                BulkString(b"foo")
//! $-1\r\n                      Null
//! *2\r\n:1\r\n:2\r\n           Array([Integer(1), Integer(2)])
//! *-1\r\n                      NullArray
//! ```
//!
//! The two null forms are distinct variants, so encoding is the exact
//! inverse of decoding for every frame the decoder accepts.

use bytes::Bytes;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// One RESP frame.
///
/// `SimpleString` and `Error` payloads never contain CR or LF. The decoder
/// cannot produce one that does, and the [`RespValue::simple_string`] and
/// [`RespValue::error`] constructors blank them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    /// Binary-safe payload
    BulkString(Bytes),
    /// `$-1\r\n`
    Null,
    Array(Vec<RespValue>),
    /// `*-1\r\n`
    NullArray,
}

impl RespValue {
    /// A status reply. CR and LF in `s` become spaces.
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(single_line(s.into()))
    }

    /// An error reply. CR and LF in `s` become spaces, so text taken from a
    /// request can never end the frame early.
    ///
    /// ```
    /// use respkv::protocol::RespValue;
    ///
    /// let err = RespValue::error("ERR unknown command 'a\r\nb'");
    /// assert_eq!(err.serialize(), b"-ERR unknown command 'a  b'\r\n");
    /// ```
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(single_line(s.into()))
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    /// `Some` becomes a bulk string, `None` the null bulk string.
    pub fn optional_bulk(data: Option<Bytes>) -> Self {
        data.map_or(RespValue::Null, RespValue::BulkString)
    }

    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    /// Encodes this value into a fresh buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Appends the encoding of this value to `buf`.
    ///
    /// Pipelined replies are batched into one buffer this way.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => write_line(buf, prefix::SIMPLE_STRING, s.as_bytes()),
            RespValue::Error(s) => write_line(buf, prefix::ERROR, s.as_bytes()),
            RespValue::Integer(n) => write_line(buf, prefix::INTEGER, n.to_string().as_bytes()),
            RespValue::BulkString(data) => {
                write_line(buf, prefix::BULK_STRING, data.len().to_string().as_bytes());
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Null => write_line(buf, prefix::BULK_STRING, b"-1"),
            RespValue::Array(values) => {
                write_line(buf, prefix::ARRAY, values.len().to_string().as_bytes());
                for value in values {
                    value.serialize_into(buf);
                }
            }
            RespValue::NullArray => write_line(buf, prefix::ARRAY, b"-1"),
        }
    }

    /// Either null form.
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null | RespValue::NullArray)
    }

    /// Short name of the variant, used in protocol error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            RespValue::SimpleString(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::BulkString(_) => "bulk string",
            RespValue::Null => "null bulk string",
            RespValue::Array(_) => "array",
            RespValue::NullArray => "null array",
        }
    }
}

fn write_line(buf: &mut Vec<u8>, prefix: u8, body: &[u8]) {
    buf.push(prefix);
    buf.extend_from_slice(body);
    buf.extend_from_slice(CRLF);
}

fn single_line(s: String) -> String {
    if s.contains(['\r', '\n']) {
        s.replace(['\r', '\n'], " ")
    } else {
        s
    }
}
