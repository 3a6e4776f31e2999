//! Accelerometer telemetry decoding and stream bookkeeping.
//!
//! The die streams `Telemetry` messages only while asked to. The host
//! keeps a count of interested consumers and toggles the stream on the
//! first subscribe and the last release.

use serde::{Deserialize, Serialize};

use crate::protocol::message::{AccelFrame, Telemetry};

/// Raw axis value that corresponds to full scale (12-bit signed).
const FULL_SCALE_RAW: f32 = 2048.0;

/// Accelerometer full-scale range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccelScale {
    G2,
    G4,
    #[default]
    G8,
}

impl AccelScale {
    pub fn g(self) -> f32 {
        match self {
            Self::G2 => 2.0,
            Self::G4 => 4.0,
            Self::G8 => 8.0,
        }
    }
}

/// Acceleration in g.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Acceleration {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// One decoded sample on the die's clock.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySample {
    pub acceleration: Acceleration,
    /// Running die time, milliseconds; wraps.
    pub timestamp_ms: u32,
}

/// Turns raw frames into samples, tracking the running timestamp.
#[derive(Debug, Clone)]
pub struct TelemetryDecoder {
    scale: AccelScale,
    last_sample_time_ms: u32,
}

impl TelemetryDecoder {
    pub fn new(scale: AccelScale) -> Self {
        Self {
            scale,
            last_sample_time_ms: 0,
        }
    }

    pub fn scale(&self) -> AccelScale {
        self.scale
    }

    /// Restart the running clock, e.g. on a new connection.
    pub fn reset(&mut self) {
        self.last_sample_time_ms = 0;
    }

    /// Decode both frames of a message, in order.
    pub fn decode(&mut self, telemetry: &Telemetry) -> [TelemetrySample; 2] {
        telemetry.frames.map(|frame| self.sample(&frame))
    }

    fn sample(&mut self, frame: &AccelFrame) -> TelemetrySample {
        self.last_sample_time_ms = self
            .last_sample_time_ms
            .wrapping_add(u32::from(frame.delta_time_ms));
        let g = self.scale.g();
        let axis = |raw: i16| f32::from(raw) / FULL_SCALE_RAW * g;
        TelemetrySample {
            acceleration: Acceleration {
                x: axis(frame.x),
                y: axis(frame.y),
                z: axis(frame.z),
            },
            timestamp_ms: self.last_sample_time_ms,
        }
    }
}

/// Reference count of telemetry consumers.
#[derive(Debug, Default)]
pub struct TelemetryStream {
    consumers: usize,
}

impl TelemetryStream {
    /// Add a consumer. Returns `true` for the first one (start streaming).
    pub fn acquire(&mut self) -> bool {
        self.consumers += 1;
        self.consumers == 1
    }

    /// Drop a consumer. Returns `true` for the last one (stop streaming).
    pub fn release(&mut self) -> bool {
        match self.consumers {
            0 => false,
            n => {
                self.consumers = n - 1;
                self.consumers == 0
            }
        }
    }

    pub fn consumers(&self) -> usize {
        self.consumers
    }

    pub fn is_active(&self) -> bool {
        self.consumers > 0
    }
}
