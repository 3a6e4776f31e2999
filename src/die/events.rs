//! Outbound die events and the sinks that receive them.
//!
//! A [`Die`](super::Die) emits these through every registered
//! [`EventSink`]. Adapters on the other side decide what to do with them:
//! log them, update a UI, feed a game engine.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use log::warn;

use super::state::DieState;
use super::telemetry::TelemetrySample;

/// Structured events emitted by a die connection.
#[derive(Debug, Clone, PartialEq)]
pub enum DieEvent {
    /// Connection or roll state changed.
    StateChanged(DieState),

    /// One decoded accelerometer sample.
    Telemetry(TelemetrySample),

    /// Settings or name were written to or read from the die.
    SettingsChanged,

    /// A log line printed by the die firmware.
    DebugLog(String),
}

/// Receives die events.
pub trait EventSink {
    fn emit(&mut self, event: &DieEvent);
}

impl<F: FnMut(&DieEvent)> EventSink for F {
    fn emit(&mut self, event: &DieEvent) {
        self(event)
    }
}

/// Identifies one registered sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type SharedSink = Rc<RefCell<dyn EventSink>>;

/// Fan-out of events to every registered sink.
#[derive(Default)]
pub(crate) struct Observers {
    sinks: RefCell<Vec<(ObserverId, SharedSink)>>,
    next_id: Cell<u64>,
}

impl Observers {
    pub fn add(&self, sink: impl EventSink + 'static) -> ObserverId {
        let id = ObserverId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let sink: SharedSink = Rc::new(RefCell::new(sink));
        self.sinks.borrow_mut().push((id, sink));
        id
    }

    pub fn remove(&self, id: ObserverId) -> bool {
        let mut sinks = self.sinks.borrow_mut();
        let before = sinks.len();
        sinks.retain(|(other, _)| *other != id);
        sinks.len() != before
    }

    /// Deliver `event` to every sink registered at the time of the call.
    ///
    /// A sink that emits back into the same die while handling an event
    /// does not receive the nested event.
    pub fn emit(&self, event: &DieEvent) {
        let snapshot: Vec<SharedSink> = self
            .sinks
            .borrow()
            .iter()
            .map(|(_, sink)| Rc::clone(sink))
            .collect();
        for sink in snapshot {
            match sink.try_borrow_mut() {
                Ok(mut sink) => sink.emit(event),
                Err(_) => warn!("Skipping re-entrant delivery of {:?}", event),
            }
        }
    }
}
