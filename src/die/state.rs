//! Connection state machine.
//!
//! ```text
//!                 connect()
//!  Disconnected ────────────▶ Unknown ──┐
//!       ▲                               │ inbound State(value)
//!       │ disconnect()                  ▼
//!       └──────────────────────── Face1..6 / Handling / Falling /
//!                                 Rolling / Jerking / Crooked
//! ```
//!
//! Exactly four causes may move the state: [`StateMachine::connect`],
//! [`StateMachine::report`] (an inbound `State` message),
//! [`StateMachine::disconnect`] and the administrative
//! [`StateMachine::force`]. The field is private so nothing else can.

use log::{error, info};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// The die's orientation/activity state as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DieState {
    /// No transport attached. Initial and terminal state.
    #[default]
    Disconnected,
    /// Connected, waiting for the die to report.
    Unknown,
    Face1,
    Face2,
    Face3,
    Face4,
    Face5,
    Face6,
    /// Being held or moved by hand.
    Handling,
    Falling,
    Rolling,
    /// Shaken hard.
    Jerking,
    /// Came to rest without a face clearly up.
    Crooked,
}

impl DieState {
    /// States the die can report over the wire, indexed by wire value.
    const REPORTABLE: [DieState; 12] = [
        Self::Unknown,
        Self::Face1,
        Self::Face2,
        Self::Face3,
        Self::Face4,
        Self::Face5,
        Self::Face6,
        Self::Handling,
        Self::Falling,
        Self::Rolling,
        Self::Jerking,
        Self::Crooked,
    ];

    /// Map a wire byte to a state. `None` for out-of-range values.
    pub fn from_wire(value: u8) -> Option<Self> {
        Self::REPORTABLE.get(usize::from(value)).copied()
    }

    /// The wire byte for this state. `Disconnected` is host-only and has none.
    pub fn wire_value(self) -> Option<u8> {
        Self::REPORTABLE
            .iter()
            .position(|s| *s == self)
            .map(|i| i as u8)
    }

    /// Face currently up, `1..=6`, or `None` when no face is up.
    pub fn face(self) -> Option<u8> {
        match self {
            Self::Face1 => Some(1),
            Self::Face2 => Some(2),
            Self::Face3 => Some(3),
            Self::Face4 => Some(4),
            Self::Face5 => Some(5),
            Self::Face6 => Some(6),
            _ => None,
        }
    }

    pub fn is_connected(self) -> bool {
        self != Self::Disconnected
    }
}

/// What caused a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    Connect,
    Report,
    Disconnect,
    Force,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Tracks the die's state and counts how often it was written.
#[derive(Debug, Default)]
pub struct StateMachine {
    current: DieState,
    /// Number of writes since construction, including same-value writes.
    transitions: u64,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> DieState {
        self.current
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// A transport was attached: the true state is not known yet.
    pub fn connect(&mut self) -> DieState {
        self.transition(DieState::Unknown, Cause::Connect)
    }

    /// Apply a state reported by the die.
    ///
    /// Reports while `Disconnected` are protocol violations and leave the
    /// machine untouched.
    pub fn report(&mut self, state: DieState) -> Result<DieState> {
        if !self.current.is_connected() {
            error!("State report {:?} received while disconnected", state);
            return Err(Error::ProtocolViolation);
        }
        Ok(self.transition(state, Cause::Report))
    }

    pub fn disconnect(&mut self) -> DieState {
        self.transition(DieState::Disconnected, Cause::Disconnect)
    }

    /// Administrative override. Bypasses the protocol entirely.
    pub fn force(&mut self, state: DieState) -> DieState {
        self.transition(state, Cause::Force)
    }

    fn transition(&mut self, next: DieState, cause: Cause) -> DieState {
        if next != self.current {
            info!("Die state: {:?} -> {:?} ({:?})", self.current, next, cause);
        }
        self.current = next;
        self.transitions += 1;
        next
    }
}
