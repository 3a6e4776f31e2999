//! Fixed-layout message codec.
//!
//! Wire format:
//! ```text
//! ┌─────────┬───────────────────────────────────────┐
//! │ Tag (1B)│ Payload (fixed size for the tag)      │
//! └─────────┴───────────────────────────────────────┘
//! ```
//!
//! Multi-byte integers are little-endian throughout, in both directions.
//! Text fields are UTF-8, NUL padded to their fixed width. The transport
//! delivers whole messages, so there is no length prefix: the tag alone
//! determines how many payload bytes to read. Bytes past the fixed layout
//! are ignored.

use core::ops::Deref;

use crate::die::state::DieState;
use crate::error::DecodeError;

use super::message::{
    AccelFrame, BULK_CHUNK_SIZE, BulkData, DEBUG_TEXT_LEN, MAX_MESSAGE_SIZE, Message,
    MessageType, NAME_LEN, Telemetry,
};

/// State byte written for [`DieState::Disconnected`], which has no wire value.
/// Decoding rejects it like any other out-of-range state.
const DISCONNECTED_WIRE_VALUE: u8 = 0xFF;

// ---------------------------------------------------------------------------
// Encoded frame
// ---------------------------------------------------------------------------

/// An encoded message, stored inline (no heap).
#[derive(Clone, Copy)]
pub struct Frame {
    bytes: [u8; MAX_MESSAGE_SIZE],
    len: usize,
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Frame({:02X?})", self.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a message into a fresh [`Frame`].
pub fn encode(message: &Message) -> Frame {
    let mut bytes = [0u8; MAX_MESSAGE_SIZE];
    let len = encode_into(message, &mut bytes);
    debug_assert!(len.is_some(), "every layout fits MAX_MESSAGE_SIZE");
    Frame {
        bytes,
        len: len.unwrap_or(0),
    }
}

/// Encode a message into `out_buf`.
///
/// Returns the number of bytes written, or `None` if `out_buf` is too
/// small for this message's layout.
pub fn encode_into(message: &Message, out_buf: &mut [u8]) -> Option<usize> {
    let ty = message.message_type();
    if out_buf.len() < ty.wire_len() {
        return None;
    }

    let mut w = Writer { buf: out_buf, pos: 0 };
    w.u8(ty.tag());

    match message {
        Message::State { state } => {
            w.u8(state.wire_value().unwrap_or(DISCONNECTED_WIRE_VALUE));
        }
        Message::Telemetry(telemetry) => {
            for frame in &telemetry.frames {
                w.i16(frame.x);
                w.i16(frame.y);
                w.i16(frame.z);
                w.u16(frame.delta_time_ms);
            }
        }
        Message::BulkSetup { size } => w.u16(*size),
        Message::BulkData(chunk) => {
            w.u16(chunk.offset);
            w.u8(chunk.size);
            w.put(&chunk.data);
        }
        Message::TransferAnimSet {
            count,
            total_animation_byte_size,
        } => {
            w.u8(*count);
            w.u16(*total_animation_byte_size);
        }
        Message::DebugLog { text } => w.padded(text.as_bytes(), DEBUG_TEXT_LEN),
        Message::PlayAnim { animation } | Message::Flash { animation } => w.u8(*animation),
        Message::RequestTelemetry { enable } => w.u8(u8::from(*enable)),
        Message::ProgramDefaultAnimSet { color } | Message::DefaultAnimSetColor { color } => {
            w.u32(*color);
        }
        Message::Rename { name } => w.padded(name.as_bytes(), NAME_LEN),
        Message::BulkSetupAck
        | Message::BulkDataAck
        | Message::TransferAnimSetAck
        | Message::TransferAnimReadyForNextAnim
        | Message::TransferSettings
        | Message::TransferSettingsAck
        | Message::RequestState
        | Message::RequestAnimSet
        | Message::RequestSettings
        | Message::ProgramDefaultAnimSetFinished
        | Message::FlashFinished
        | Message::RequestDefaultAnimSetColor
        | Message::RenameFinished => {}
    }

    Some(w.pos)
}

/// Sequential writer over a buffer already checked to fit the layout.
struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Writer<'_> {
    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn padded(&mut self, bytes: &[u8], width: usize) {
        let n = bytes.len().min(width);
        self.put(&bytes[..n]);
        self.buf[self.pos..self.pos + (width - n)].fill(0);
        self.pos += width - n;
    }

    fn u8(&mut self, v: u8) {
        self.put(&[v]);
    }

    fn u16(&mut self, v: u16) {
        self.put(&v.to_le_bytes());
    }

    fn i16(&mut self, v: i16) {
        self.put(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.put(&v.to_le_bytes());
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one whole message.
///
/// Never returns a partially populated message: the length is checked
/// against the tag's fixed layout before any field is read.
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    let (&tag, payload) = bytes.split_first().ok_or(DecodeError::Empty)?;
    let ty = MessageType::from_tag(tag).ok_or(DecodeError::UnknownTag(tag))?;

    if payload.len() < ty.payload_len() {
        return Err(DecodeError::Truncated {
            message: ty,
            expected: ty.wire_len(),
            actual: bytes.len(),
        });
    }

    let mut r = Reader { buf: payload, pos: 0 };

    let message = match ty {
        MessageType::State => {
            let raw = r.u8();
            let state = DieState::from_wire(raw).ok_or(DecodeError::InvalidState(raw))?;
            Message::State { state }
        }
        MessageType::Telemetry => {
            let mut telemetry = Telemetry::default();
            for frame in &mut telemetry.frames {
                *frame = AccelFrame {
                    x: r.i16(),
                    y: r.i16(),
                    z: r.i16(),
                    delta_time_ms: r.u16(),
                };
            }
            Message::Telemetry(telemetry)
        }
        MessageType::BulkSetup => Message::BulkSetup { size: r.u16() },
        MessageType::BulkSetupAck => Message::BulkSetupAck,
        MessageType::BulkData => {
            let offset = r.u16();
            let size = r.u8();
            if usize::from(size) > BULK_CHUNK_SIZE {
                return Err(DecodeError::InvalidField {
                    message: ty,
                    field: "size",
                });
            }
            Message::BulkData(BulkData {
                offset,
                size,
                data: r.array(),
            })
        }
        MessageType::BulkDataAck => Message::BulkDataAck,
        MessageType::TransferAnimSet => Message::TransferAnimSet {
            count: r.u8(),
            total_animation_byte_size: r.u16(),
        },
        MessageType::TransferAnimSetAck => Message::TransferAnimSetAck,
        MessageType::TransferAnimReadyForNextAnim => Message::TransferAnimReadyForNextAnim,
        MessageType::TransferSettings => Message::TransferSettings,
        MessageType::TransferSettingsAck => Message::TransferSettingsAck,
        MessageType::DebugLog => {
            let raw: [u8; DEBUG_TEXT_LEN] = r.array();
            Message::DebugLog {
                text: padded_text(&raw, ty, "text")?,
            }
        }
        MessageType::PlayAnim => Message::PlayAnim { animation: r.u8() },
        MessageType::RequestState => Message::RequestState,
        MessageType::RequestAnimSet => Message::RequestAnimSet,
        MessageType::RequestSettings => Message::RequestSettings,
        MessageType::RequestTelemetry => {
            let enable = match r.u8() {
                0 => false,
                1 => true,
                _ => {
                    return Err(DecodeError::InvalidField {
                        message: ty,
                        field: "enable",
                    });
                }
            };
            Message::RequestTelemetry { enable }
        }
        MessageType::ProgramDefaultAnimSet => Message::ProgramDefaultAnimSet { color: r.u32() },
        MessageType::ProgramDefaultAnimSetFinished => Message::ProgramDefaultAnimSetFinished,
        MessageType::Flash => Message::Flash { animation: r.u8() },
        MessageType::FlashFinished => Message::FlashFinished,
        MessageType::RequestDefaultAnimSetColor => Message::RequestDefaultAnimSetColor,
        MessageType::DefaultAnimSetColor => Message::DefaultAnimSetColor { color: r.u32() },
        MessageType::Rename => {
            let raw: [u8; NAME_LEN] = r.array();
            Message::Rename {
                name: padded_text(&raw, ty, "name")?,
            }
        }
        MessageType::RenameFinished => Message::RenameFinished,
    };

    Ok(message)
}

/// Parse a NUL-padded UTF-8 field. Everything from the first NUL on is
/// padding.
fn padded_text<const N: usize>(
    raw: &[u8],
    message: MessageType,
    field: &'static str,
) -> Result<heapless::String<N>, DecodeError> {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    let text = core::str::from_utf8(&raw[..end])
        .map_err(|_| DecodeError::InvalidField { message, field })?;
    let mut out = heapless::String::new();
    out.push_str(text)
        .map_err(|()| DecodeError::InvalidField { message, field })?;
    Ok(out)
}

/// Sequential reader over a payload already checked against the layout.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        let [v] = self.array();
        v
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.array())
    }

    fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.array())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.array())
    }
}

// ── Tests ────────────────────────────────────────────────────
