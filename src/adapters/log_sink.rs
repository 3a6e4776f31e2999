//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing die events to the `log` facade.
//! A UI or game-engine adapter would implement the same trait.

use log::{debug, info};

use crate::die::events::{DieEvent, EventSink};

/// Adapter that logs every [`DieEvent`], tagged with the die's name.
pub struct LogEventSink {
    label: String,
}

impl LogEventSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &DieEvent) {
        match event {
            DieEvent::StateChanged(state) => match state.face() {
                Some(face) => info!("STATE | {} | {:?} (face {})", self.label, state, face),
                None => info!("STATE | {} | {:?}", self.label, state),
            },
            // Telemetry arrives at sample rate; keep it out of info.
            DieEvent::Telemetry(s) => {
                debug!(
                    "TELEM | {} | t={}ms | x={:.3}g y={:.3}g z={:.3}g",
                    self.label,
                    s.timestamp_ms,
                    s.acceleration.x,
                    s.acceleration.y,
                    s.acceleration.z,
                );
            }
            DieEvent::SettingsChanged => info!("SETTINGS | {} | changed", self.label),
            DieEvent::DebugLog(text) => info!("DIE | {} | {}", self.label, text),
        }
    }
}
