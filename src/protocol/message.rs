//! Message types exchanged with the die.
//!
//! Every message is a fixed-layout value identified by a one-byte tag.
//! The layouts themselves live in [`codec`](super::codec); this module only
//! defines the typed representation and the tag table.

use heapless::String;

use crate::die::state::DieState;

/// Payload bytes carried by a single bulk chunk.
pub const BULK_CHUNK_SIZE: usize = 16;

/// Capacity of the NUL-padded text in a `DebugLog` message.
pub const DEBUG_TEXT_LEN: usize = 19;

/// Capacity of the NUL-padded name in a `Rename` message.
pub const NAME_LEN: usize = 16;

/// Largest encoded message (tag + payload), one BLE notification.
pub const MAX_MESSAGE_SIZE: usize = 20;

/// Text of a debug log line sent by the die firmware.
pub type DebugText = String<DEBUG_TEXT_LEN>;

/// Advertised die name.
pub type DieName = String<NAME_LEN>;

// ---------------------------------------------------------------------------
// Tag table
// ---------------------------------------------------------------------------

/// Leading tag byte of every encoded message.
///
/// Values are part of the wire format and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MessageType {
    State = 1,
    Telemetry = 2,
    BulkSetup = 3,
    BulkSetupAck = 4,
    BulkData = 5,
    BulkDataAck = 6,
    TransferAnimSet = 7,
    TransferAnimSetAck = 8,
    TransferAnimReadyForNextAnim = 9,
    TransferSettings = 10,
    TransferSettingsAck = 11,
    DebugLog = 12,
    PlayAnim = 13,
    RequestState = 14,
    RequestAnimSet = 15,
    RequestSettings = 16,
    RequestTelemetry = 17,
    ProgramDefaultAnimSet = 18,
    ProgramDefaultAnimSetFinished = 19,
    Flash = 20,
    FlashFinished = 21,
    RequestDefaultAnimSetColor = 22,
    DefaultAnimSetColor = 23,
    Rename = 24,
    RenameFinished = 25,
}

impl MessageType {
    /// Every message type, in tag order.
    pub const ALL: [MessageType; 25] = [
        Self::State,
        Self::Telemetry,
        Self::BulkSetup,
        Self::BulkSetupAck,
        Self::BulkData,
        Self::BulkDataAck,
        Self::TransferAnimSet,
        Self::TransferAnimSetAck,
        Self::TransferAnimReadyForNextAnim,
        Self::TransferSettings,
        Self::TransferSettingsAck,
        Self::DebugLog,
        Self::PlayAnim,
        Self::RequestState,
        Self::RequestAnimSet,
        Self::RequestSettings,
        Self::RequestTelemetry,
        Self::ProgramDefaultAnimSet,
        Self::ProgramDefaultAnimSetFinished,
        Self::Flash,
        Self::FlashFinished,
        Self::RequestDefaultAnimSetColor,
        Self::DefaultAnimSetColor,
        Self::Rename,
        Self::RenameFinished,
    ];

    /// Look up the message type for a tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| *ty as u8 == tag)
    }

    /// The tag byte that starts every message of this type.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Size of the fixed payload that follows the tag.
    pub const fn payload_len(self) -> usize {
        match self {
            Self::State | Self::PlayAnim | Self::RequestTelemetry | Self::Flash => 1,
            Self::Telemetry => 2 * AccelFrame::WIRE_LEN,
            Self::BulkSetup => 2,
            Self::BulkData => 3 + BULK_CHUNK_SIZE,
            Self::TransferAnimSet => 3,
            Self::DebugLog => DEBUG_TEXT_LEN,
            Self::ProgramDefaultAnimSet | Self::DefaultAnimSetColor => 4,
            Self::Rename => NAME_LEN,
            Self::BulkSetupAck
            | Self::BulkDataAck
            | Self::TransferAnimSetAck
            | Self::TransferAnimReadyForNextAnim
            | Self::TransferSettings
            | Self::TransferSettingsAck
            | Self::RequestState
            | Self::RequestAnimSet
            | Self::RequestSettings
            | Self::ProgramDefaultAnimSetFinished
            | Self::FlashFinished
            | Self::RequestDefaultAnimSetColor
            | Self::RenameFinished => 0,
        }
    }

    /// Total encoded length including the tag.
    pub const fn wire_len(self) -> usize {
        1 + self.payload_len()
    }
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// One raw accelerometer sample as reported by the die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccelFrame {
    /// Raw axis readings, 12-bit scale (±2048 = ±full scale).
    pub x: i16,
    pub y: i16,
    pub z: i16,
    /// Milliseconds elapsed on the die clock since the previous sample.
    pub delta_time_ms: u16,
}

impl AccelFrame {
    pub(crate) const WIRE_LEN: usize = 8;
}

/// Telemetry message payload: two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Telemetry {
    pub frames: [AccelFrame; 2],
}

/// One chunk of a bulk transfer.
///
/// `size` is explicit because the final chunk may be shorter than
/// [`BULK_CHUNK_SIZE`]; bytes of `data` past `size` are padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkData {
    pub offset: u16,
    pub size: u8,
    pub data: [u8; BULK_CHUNK_SIZE],
}

impl BulkData {
    /// Build a chunk from at most [`BULK_CHUNK_SIZE`] bytes of `chunk`,
    /// zero-padding the remainder.
    pub fn new(offset: u16, chunk: &[u8]) -> Self {
        let size = chunk.len().min(BULK_CHUNK_SIZE);
        let mut data = [0u8; BULK_CHUNK_SIZE];
        data[..size].copy_from_slice(&chunk[..size]);
        Self {
            offset,
            size: size as u8,
            data,
        }
    }

    /// The meaningful bytes of this chunk.
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.size).min(BULK_CHUNK_SIZE)]
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A decoded message, host → die or die → host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Die reports its current state.
    State { state: DieState },
    /// Two accelerometer samples.
    Telemetry(Telemetry),
    /// Announces a bulk payload of `size` bytes.
    BulkSetup { size: u16 },
    BulkSetupAck,
    BulkData(BulkData),
    BulkDataAck,
    /// Prepares an animation set transfer.
    TransferAnimSet {
        count: u8,
        total_animation_byte_size: u16,
    },
    TransferAnimSetAck,
    /// The receiver has stored one animation and can take the next.
    TransferAnimReadyForNextAnim,
    TransferSettings,
    TransferSettingsAck,
    /// Free-form text from the die firmware.
    DebugLog { text: DebugText },
    PlayAnim { animation: u8 },
    RequestState,
    RequestAnimSet,
    RequestSettings,
    /// Turns the telemetry stream on or off.
    RequestTelemetry { enable: bool },
    /// Reprogram the default animation set with a new colour (0x00RRGGBB).
    ProgramDefaultAnimSet { color: u32 },
    ProgramDefaultAnimSetFinished,
    Flash { animation: u8 },
    FlashFinished,
    RequestDefaultAnimSetColor,
    DefaultAnimSetColor { color: u32 },
    Rename { name: DieName },
    RenameFinished,
}

impl Message {
    /// The tag this message is encoded with.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::State { .. } => MessageType::State,
            Self::Telemetry(_) => MessageType::Telemetry,
            Self::BulkSetup { .. } => MessageType::BulkSetup,
            Self::BulkSetupAck => MessageType::BulkSetupAck,
            Self::BulkData(_) => MessageType::BulkData,
            Self::BulkDataAck => MessageType::BulkDataAck,
            Self::TransferAnimSet { .. } => MessageType::TransferAnimSet,
            Self::TransferAnimSetAck => MessageType::TransferAnimSetAck,
            Self::TransferAnimReadyForNextAnim => MessageType::TransferAnimReadyForNextAnim,
            Self::TransferSettings => MessageType::TransferSettings,
            Self::TransferSettingsAck => MessageType::TransferSettingsAck,
            Self::DebugLog { .. } => MessageType::DebugLog,
            Self::PlayAnim { .. } => MessageType::PlayAnim,
            Self::RequestState => MessageType::RequestState,
            Self::RequestAnimSet => MessageType::RequestAnimSet,
            Self::RequestSettings => MessageType::RequestSettings,
            Self::RequestTelemetry { .. } => MessageType::RequestTelemetry,
            Self::ProgramDefaultAnimSet { .. } => MessageType::ProgramDefaultAnimSet,
            Self::ProgramDefaultAnimSetFinished => MessageType::ProgramDefaultAnimSetFinished,
            Self::Flash { .. } => MessageType::Flash,
            Self::FlashFinished => MessageType::FlashFinished,
            Self::RequestDefaultAnimSetColor => MessageType::RequestDefaultAnimSetColor,
            Self::DefaultAnimSetColor { .. } => MessageType::DefaultAnimSetColor,
            Self::Rename { .. } => MessageType::Rename,
            Self::RenameFinished => MessageType::RenameFinished,
        }
    }
}

/// Copy `text` into a fixed-capacity string, cutting at a char boundary.
pub fn truncate_text<const N: usize>(text: &str) -> String<N> {
    let mut out = String::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
