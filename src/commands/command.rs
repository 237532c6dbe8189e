//! Command Parsing
//!
//! Turns a decoded frame into a typed [`Command`]. A request is an array
//! whose elements are all bulk strings; the first element names the command
//! and is matched case-insensitively, with no prefix or fuzzy matching.
//!
//! Parsing is pure. The caller supplies the current time so that
//! `SET ... PX <ms>` can be resolved to an absolute expiry.
//!
//! ## Adding a Command
//!
//! 1. Add a variant to [`Command`]
//! 2. Add a match arm in [`Command::from_frame`]
//! 3. Add a match arm in `CommandHandler::run`

use crate::protocol::RespValue;
use bytes::Bytes;
use thiserror::Error;

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `PING [message]`
    Ping(Option<Bytes>),

    /// `ECHO message`
    Echo(Bytes),

    /// `SET key value [PX milliseconds]`
    Set {
        key: Bytes,
        value: Bytes,
        /// Absolute expiry in milliseconds since the UNIX epoch
        expire_at: Option<u64>,
    },

    /// `GET key`
    Get { key: Bytes },

    /// A well-formed request naming a command we don't implement.
    /// Arity is never checked for these.
    Unknown { name: String, argc: usize },
}

/// A well-framed request that is not a valid command.
///
/// Each variant renders as the text of the RESP error reply sent back to the
/// client; none of them close the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Not an array of bulk strings, or an empty array
    #[error("ERR Protocol error: {0}")]
    Protocol(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    /// Numeric argument missing, negative, or out of range
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    /// Unrecognised option in a trailing-argument position
    #[error("ERR syntax error")]
    Syntax,
}

impl CommandError {
    /// The RESP error reply for this error.
    pub fn to_reply(&self) -> RespValue {
        RespValue::error(self.to_string())
    }
}

impl Command {
    /// Parses a request frame.
    ///
    /// `now_ms` is the current time in milliseconds since the UNIX epoch.
    ///
    /// # Example
    ///
    /// ```
    /// use respkv::commands::Command;
    /// use respkv::protocol::RespValue;
    /// use bytes::Bytes;
    ///
    /// let frame = RespValue::array(vec![
    ///     RespValue::bulk_string(Bytes::from("set")),
    ///     RespValue::bulk_string(Bytes::from("k")),
    ///     RespValue::bulk_string(Bytes::from("v")),
    ///     RespValue::bulk_string(Bytes::from("px")),
    ///     RespValue::bulk_string(Bytes::from("100")),
    /// ]);
    ///
    /// let command = Command::from_frame(frame, 1_000).unwrap();
    /// assert_eq!(
    ///     command,
    ///     Command::Set {
    ///         key: Bytes::from("k"),
    ///         value: Bytes::from("v"),
    ///         expire_at: Some(1_100),
    ///     }
    /// );
    /// ```
    pub fn from_frame(frame: RespValue, now_ms: u64) -> Result<Command, CommandError> {
        let args = bulk_arguments(frame)?;
        let Some(name) = args.first() else {
            return Err(CommandError::Protocol("empty command".to_string()));
        };

        if name.eq_ignore_ascii_case(b"PING") {
            parse_ping(&args)
        } else if name.eq_ignore_ascii_case(b"ECHO") {
            parse_echo(&args)
        } else if name.eq_ignore_ascii_case(b"SET") {
            parse_set(&args, now_ms)
        } else if name.eq_ignore_ascii_case(b"GET") {
            parse_get(&args)
        } else {
            Ok(Command::Unknown {
                name: printable_name(name),
                argc: args.len() - 1,
            })
        }
    }

    /// Lower-case command name, for logging.
    pub fn name(&self) -> &str {
        match self {
            Command::Ping(_) => "ping",
            Command::Echo(_) => "echo",
            Command::Set { .. } => "set",
            Command::Get { .. } => "get",
            Command::Unknown { name, .. } => name.as_str(),
        }
    }
}

/// Longest command name echoed back in an unknown-command reply
const MAX_ECHOED_NAME: usize = 128;

/// Renders a client-supplied command name for replies and logs.
///
/// Control characters become spaces and the result is cut to
/// `MAX_ECHOED_NAME` characters.
fn printable_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name)
        .chars()
        .take(MAX_ECHOED_NAME)
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Unwraps an array of bulk strings into its payloads.
fn bulk_arguments(frame: RespValue) -> Result<Vec<Bytes>, CommandError> {
    let elements = match frame {
        RespValue::Array(elements) => elements,
        other => {
            return Err(CommandError::Protocol(format!(
                "expected array, got {}",
                other.kind()
            )))
        }
    };

    elements
        .into_iter()
        .map(|element| match element {
            RespValue::BulkString(data) => Ok(data),
            other => Err(CommandError::Protocol(format!(
                "expected bulk string argument, got {}",
                other.kind()
            ))),
        })
        .collect()
}

fn parse_ping(args: &[Bytes]) -> Result<Command, CommandError> {
    match args {
        [_] => Ok(Command::Ping(None)),
        [_, message] => Ok(Command::Ping(Some(message.clone()))),
        _ => Err(CommandError::WrongArity("ping")),
    }
}

fn parse_echo(args: &[Bytes]) -> Result<Command, CommandError> {
    match args {
        [_, message] => Ok(Command::Echo(message.clone())),
        _ => Err(CommandError::WrongArity("echo")),
    }
}

fn parse_set(args: &[Bytes], now_ms: u64) -> Result<Command, CommandError> {
    let (key, value, options) = match args {
        [_, key, value, options @ ..] => (key.clone(), value.clone(), options),
        _ => return Err(CommandError::WrongArity("set")),
    };

    let expire_at = match options {
        [] => None,
        [option] if option.eq_ignore_ascii_case(b"PX") => {
            return Err(CommandError::WrongArity("set"))
        }
        [option, millis] if option.eq_ignore_ascii_case(b"PX") => {
            let millis = parse_millis(millis)?;
            Some(now_ms.checked_add(millis).ok_or(CommandError::NotAnInteger)?)
        }
        _ => return Err(CommandError::Syntax),
    };

    Ok(Command::Set {
        key,
        value,
        expire_at,
    })
}

fn parse_get(args: &[Bytes]) -> Result<Command, CommandError> {
    match args {
        [_, key] => Ok(Command::Get { key: key.clone() }),
        _ => Err(CommandError::WrongArity("get")),
    }
}

/// Parses a non-negative decimal millisecond count.
fn parse_millis(raw: &[u8]) -> Result<u64, CommandError> {
    if raw.is_empty() || !raw.iter().all(u8::is_ascii_digit) {
        return Err(CommandError::NotAnInteger);
    }

    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(CommandError::NotAnInteger)
}
