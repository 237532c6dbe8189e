//! Incremental RESP Protocol Parser
//!
//! This module turns raw bytes into [`RespValue`]s. Decoding dispatches on
//! the first byte of the buffer and every type's decoder consumes exactly
//! what its header declares, so bulk payloads may contain CR, LF, NUL or
//! invalid UTF-8 without confusing the framing.
//!
//! ## How the Parser Works
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((value, consumed)))` - Successfully parsed a value, `consumed` bytes were used
//! - `Ok(None)` - Need more data, the frame is incomplete
//! - `Err(ParseError)` - Malformed frame, byte-stream alignment is lost
//!
//! This design allows the caller to:
//! 1. Append incoming network data to a buffer
//! 2. Call `parse()` to attempt parsing
//! 3. If successful, advance the buffer by `consumed` bytes
//! 4. If incomplete, wait for more data and retry from the same position
//! 5. If malformed, reply with an error and drop the connection

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
///
/// All of these mean the frame is malformed. An incomplete frame is not an
/// error and is reported as `Ok(None)` instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// Invalid integer format in an integer frame or a length header
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a simple string or error message
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative (but not -1 for null)
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Bulk payload not followed by CRLF
    #[error("bulk string missing trailing CRLF")]
    MissingTerminator,

    /// Array nesting exceeded the caller-imposed limit
    #[error("maximum nesting depth exceeded: {0}")]
    DepthLimitExceeded(usize),

    /// The message exceeds maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// An incremental RESP protocol parser.
///
/// The parser holds no buffered data. Besides the optional nesting limit it
/// remembers how many bytes the pending frame needs at least, so a caller
/// that keeps appending to the same buffer is not charged a full re-decode
/// (and a copy of every finished bulk payload) on each short read. After
/// `Ok(None)`, the next call must see the same bytes with more appended;
/// call [`RespParser::reset`] before handing it an unrelated buffer.
///
/// # Example
///
/// ```
/// use respkv::protocol::{RespParser, RespValue};
///
/// let mut parser = RespParser::new();
/// let buffer = b"*2\r\n$3\r\nGET\r\n$5\r\nfruit\r\n";
///
/// let (value, consumed) = parser.parse(buffer).unwrap().unwrap();
/// assert_eq!(consumed, buffer.len());
/// assert!(matches!(value, RespValue::Array(_)));
/// ```
#[derive(Debug, Default, Clone)]
pub struct RespParser {
    /// Current nesting depth (for array parsing)
    depth: usize,

    /// Optional limit on array nesting
    max_depth: Option<usize>,

    /// Lower bound on the length of the pending frame, 0 when none
    needed: usize,
}

impl RespParser {
    /// Creates a parser with no nesting limit.
    pub fn new() -> Self {
        Self {
            depth: 0,
            max_depth: None,
            needed: 0,
        }
    }

    /// Creates a parser that rejects arrays nested deeper than `max_depth`.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth: Some(max_depth),
            needed: 0,
        }
    }

    /// Forgets the pending frame.
    pub fn reset(&mut self) {
        self.depth = 0;
        self.needed = 0;
    }

    /// Bytes the pending frame needs before another decode attempt can
    /// succeed, or 0 when nothing is pending.
    pub fn needed(&self) -> usize {
        self.needed
    }

    /// Attempts to parse a RESP value from the front of the buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((value, consumed)))` - Successfully parsed a value
    /// - `Ok(None)` - Incomplete data, need more bytes
    /// - `Err(e)` - Malformed frame
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        if buf.len() < self.needed {
            return Ok(None);
        }

        self.reset();
        let result = self.parse_value(buf);
        match result {
            Ok(None) => self.needed = self.needed.max(buf.len() + 1),
            _ => self.needed = 0,
        }
        result
    }

    /// Internal recursive parsing function.
    fn parse_value(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        match buf[0] {
            prefix::SIMPLE_STRING => Ok(parse_line(buf)?
                .map(|(line, used)| (RespValue::SimpleString(line.to_string()), used))),
            prefix::ERROR => {
                Ok(parse_line(buf)?.map(|(line, used)| (RespValue::Error(line.to_string()), used)))
            }
            prefix::INTEGER => self.parse_integer(buf),
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf),
            other => Err(ParseError::UnknownPrefix(other)),
        }
    }

    /// Parses an integer: `:<integer>\r\n`
    fn parse_integer(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        debug_assert!(buf[0] == prefix::INTEGER);

        let Some((line, consumed)) = parse_line(buf)? else {
            return Ok(None);
        };

        let digits = match line.strip_prefix('+') {
            Some(rest) if rest.starts_with('-') => {
                return Err(ParseError::InvalidInteger(line.to_string()))
            }
            Some(rest) => rest,
            None => line,
        };
        let n = parse_decimal(digits.as_bytes())?;
        Ok(Some((RespValue::Integer(n), consumed)))
    }

    /// Parses a bulk string: `$<length>\r\n<data>\r\n`
    fn parse_bulk_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        debug_assert!(buf[0] == prefix::BULK_STRING);

        let Some((length, header_len)) = parse_header(buf)? else {
            return Ok(None);
        };

        if length == -1 {
            return Ok(Some((RespValue::Null, header_len)));
        }

        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = usize::try_from(length).map_err(|_| ParseError::InvalidBulkLength(length))?;

        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let data_start = header_len;
        let data_end = data_start + length;
        let total_needed = data_end + CRLF.len();

        // A trailing byte that is already wrong is malformed even if the
        // second terminator byte has not arrived yet.
        let available_tail = &buf[data_end.min(buf.len())..total_needed.min(buf.len())];
        if available_tail != &CRLF[..available_tail.len()] {
            return Err(ParseError::MissingTerminator);
        }

        if buf.len() < total_needed {
            self.needed = total_needed;
            return Ok(None);
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_end]);
        Ok(Some((RespValue::BulkString(data), total_needed)))
    }

    /// Parses an array: `*<count>\r\n<elements...>`
    fn parse_array(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        debug_assert!(buf[0] == prefix::ARRAY);

        let Some((count, header_len)) = parse_header(buf)? else {
            return Ok(None);
        };

        if count == -1 {
            return Ok(Some((RespValue::NullArray, header_len)));
        }

        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        if let Some(max) = self.max_depth {
            if self.depth >= max {
                return Err(ParseError::DepthLimitExceeded(max));
            }
        }

        let count = usize::try_from(count).map_err(|_| ParseError::InvalidArrayLength(count))?;

        // The declared count is untrusted; never pre-allocate more slots
        // than the remaining bytes could possibly hold.
        let mut elements = Vec::with_capacity(count.min(buf.len() - header_len));
        let mut consumed = header_len;

        self.depth += 1;
        for _ in 0..count {
            match self.parse_value(&buf[consumed..])? {
                Some((value, element_consumed)) => {
                    elements.push(value);
                    consumed += element_consumed;
                }
                None => {
                    self.depth -= 1;
                    self.needed += consumed;
                    return Ok(None);
                }
            }
        }
        self.depth -= 1;

        Ok(Some((RespValue::Array(elements), consumed)))
    }
}

/// Splits a `<prefix><text>\r\n` line off the front of `buf`.
///
/// Returns the text and the number of bytes used, prefix and CRLF included.
/// A bare CR or LF inside the line is malformed.
fn parse_line(buf: &[u8]) -> ParseResult<Option<(&str, usize)>> {
    let Some(pos) = find_crlf(&buf[1..])? else {
        return Ok(None);
    };

    let content = &buf[1..1 + pos];
    let text = std::str::from_utf8(content).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;

    // +1 for prefix, +2 for CRLF
    Ok(Some((text, 1 + pos + 2)))
}

/// Parses a `$` / `*` length header.
fn parse_header(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let Some(pos) = find_crlf(&buf[1..])? else {
        return Ok(None);
    };

    let n = parse_decimal(&buf[1..1 + pos])?;
    Ok(Some((n, 1 + pos + 2)))
}

/// Parses `-?[0-9]+` without allocating.
fn parse_decimal(digits: &[u8]) -> ParseResult<i64> {
    let invalid = || ParseError::InvalidInteger(String::from_utf8_lossy(digits).into_owned());

    let (negative, body) = match digits.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, digits),
    };

    if body.is_empty() {
        return Err(invalid());
    }

    let mut n: i64 = 0;
    for &b in body {
        if !b.is_ascii_digit() {
            return Err(invalid());
        }
        let digit = i64::from(b - b'0');
        n = n
            .checked_mul(10)
            .and_then(|n| {
                if negative {
                    n.checked_sub(digit)
                } else {
                    n.checked_add(digit)
                }
            })
            .ok_or_else(invalid)?;
    }

    Ok(n)
}

/// Finds the position of the first CRLF in a header or line.
///
/// Returns the position of `\r`, `Ok(None)` if the line is not terminated
/// yet, or an error if a lone CR or LF shows up inside the line.
#[inline]
fn find_crlf(buf: &[u8]) -> ParseResult<Option<usize>> {
    for (i, &b) in buf.iter().enumerate() {
        match b {
            b'\r' => match buf.get(i + 1) {
                Some(b'\n') => return Ok(Some(i)),
                Some(_) => return Err(ParseError::MissingTerminator),
                None => return Ok(None),
            },
            b'\n' => return Err(ParseError::MissingTerminator),
            _ => {}
        }
    }
    Ok(None)
}

/// Helper function to parse a single RESP message from bytes.
///
/// The parser has no nesting limit.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}

/// Decodes one value from the front of `buf`, returning it together with
/// the bytes that follow it.
///
/// `Ok(None)` means the buffer holds only a prefix of a frame.
///
/// ```
/// use respkv::protocol::{decode, RespValue};
///
/// let (value, rest) = decode(b"+OK\r\n:1\r\n").unwrap().unwrap();
/// assert_eq!(value, RespValue::ok());
/// assert_eq!(rest, b":1\r\n");
/// ```
pub fn decode(buf: &[u8]) -> ParseResult<Option<(RespValue, &[u8])>> {
    Ok(parse_message(buf)?.map(|(value, consumed)| (value, &buf[consumed..])))
}
