//! Unified error types for the die link.
//!
//! A single [`Error`] enum that every layer converts into, with the codec's
//! [`DecodeError`] nested inside it. Variants are `Clone` and carry only
//! plain data so they can be logged, compared in tests, and handed back
//! across suspension points without allocation.

use core::fmt;

use crate::protocol::message::MessageType;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Inbound bytes did not form a valid message.
    Decode(DecodeError),
    /// A message arrived while the connection was `Disconnected`.
    ProtocolViolation,
    /// A bounded wait elapsed before the expected message arrived.
    Timeout(MessageType),
    /// No transport port is attached, so nothing can be sent.
    NotConnected,
    /// A bulk payload does not fit the 16-bit size field.
    PayloadTooLarge(usize),
    /// An animation set holds more animations than the count byte allows.
    TooManyAnimations(usize),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::ProtocolViolation => write!(f, "message received while disconnected"),
            Self::Timeout(ty) => write!(f, "timed out waiting for {ty:?}"),
            Self::NotConnected => write!(f, "die is not connected"),
            Self::PayloadTooLarge(len) => {
                write!(f, "bulk payload of {len} bytes exceeds {} bytes", u16::MAX)
            }
            Self::TooManyAnimations(count) => {
                write!(f, "{count} animations exceed the limit of {}", u8::MAX)
            }
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Reasons a byte buffer could not be decoded into a [`Message`].
///
/// [`Message`]: crate::protocol::message::Message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer held no bytes at all, not even a tag.
    Empty,
    /// The leading tag does not name a known message type.
    UnknownTag(u8),
    /// The payload is shorter than the variant's fixed layout.
    Truncated {
        message: MessageType,
        expected: usize,
        actual: usize,
    },
    /// A `State` message carried a value outside the state enumeration.
    InvalidState(u8),
    /// A field held a value its layout does not allow.
    InvalidField {
        message: MessageType,
        field: &'static str,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty message"),
            Self::UnknownTag(tag) => write!(f, "unknown message tag 0x{tag:02X}"),
            Self::Truncated {
                message,
                expected,
                actual,
            } => write!(
                f,
                "{message:?} truncated: expected {expected} bytes, got {actual}"
            ),
            Self::InvalidState(value) => write!(f, "invalid die state {value}"),
            Self::InvalidField { message, field } => {
                write!(f, "{message:?} has an invalid `{field}` field")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
