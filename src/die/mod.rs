//! One connected die: state, telemetry, commands.
//!
//! ```text
//!  transport ──▶ on_bytes_received ──▶ Link ──▶ DispatchTable
//!                                                 │
//!                    ┌────────────────────────────┼─────────────────┐
//!                    ▼                            ▼                 ▼
//!              StateMachine              TelemetryDecoder     pending waits
//!                    │                            │
//!                    └──────────▶ EventSink ◀─────┘
//! ```
//!
//! [`Die`] is a cheap handle (`Rc`) so async commands and event sinks can
//! hold on to it. All methods take `&self`; mutation goes through
//! `RefCell`s that are never borrowed across an `.await` or an event
//! emission.

pub mod events;
pub mod state;
pub mod telemetry;
mod transfer;

use core::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, error, info, warn};

use crate::config::DieConfig;
use crate::error::{Error, Result};
use crate::protocol::bulk;
use crate::protocol::message::{DieName, Message, MessageType, truncate_text};
use crate::protocol::{Deadline, Link, Registration, TransportPort};

use events::{DieEvent, EventSink, ObserverId, Observers};
use state::{DieState, StateMachine};
use telemetry::{TelemetryDecoder, TelemetryStream};

struct DieShared {
    address: String,
    name: RefCell<String>,
    config: DieConfig,
    state: RefCell<StateMachine>,
    link: Rc<Link>,
    observers: Observers,
    decoder: RefCell<TelemetryDecoder>,
    stream: RefCell<TelemetryStream>,
    /// Inbound handlers that live as long as the die.
    handlers: RefCell<Vec<Registration>>,
}

/// Host-side handle to one die.
#[derive(Clone)]
pub struct Die {
    shared: Rc<DieShared>,
}

impl Die {
    /// Create a disconnected die.
    pub fn new(
        address: impl Into<String>,
        name: impl Into<String>,
        config: DieConfig,
    ) -> Result<Self> {
        config.validate()?;
        let shared = Rc::new(DieShared {
            address: address.into(),
            name: RefCell::new(name.into()),
            state: RefCell::new(StateMachine::new()),
            link: Rc::new(Link::new(config.reply_timeout())),
            observers: Observers::default(),
            decoder: RefCell::new(TelemetryDecoder::new(config.accel_scale)),
            stream: RefCell::new(TelemetryStream::default()),
            handlers: RefCell::new(Vec::new()),
            config,
        });

        let weak = Rc::downgrade(&shared);
        let registrations = vec![
            shared.link.on(MessageType::State, inbound(&weak, DieShared::on_state)),
            shared
                .link
                .on(MessageType::Telemetry, inbound(&weak, DieShared::on_telemetry)),
            shared
                .link
                .on(MessageType::DebugLog, inbound(&weak, DieShared::on_debug_log)),
        ];
        *shared.handlers.borrow_mut() = registrations;

        Ok(Self { shared })
    }

    // ── Identity ──────────────────────────────────────────────

    /// Opaque transport address.
    pub fn address(&self) -> &str {
        &self.shared.address
    }

    pub fn name(&self) -> String {
        self.shared.name.borrow().clone()
    }

    pub fn config(&self) -> &DieConfig {
        &self.shared.config
    }

    /// The underlying link, for protocol-level use.
    pub fn link(&self) -> &Rc<Link> {
        &self.shared.link
    }

    // ── State ─────────────────────────────────────────────────

    pub fn state(&self) -> DieState {
        self.shared.state.borrow().current()
    }

    /// Face currently up, if any.
    pub fn face(&self) -> Option<u8> {
        self.state().face()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Attach a transport and ask the die for its state.
    ///
    /// Telemetry is re-requested if anyone is subscribed.
    pub fn connect(&self, port: Rc<dyn TransportPort>) -> Result<()> {
        let shared = &self.shared;
        shared.link.attach(port);
        shared.decoder.borrow_mut().reset();
        let state = shared.state.borrow_mut().connect();
        info!("{}: connected ({})", shared.name.borrow(), shared.address);
        shared.observers.emit(&DieEvent::StateChanged(state));

        self.ping()?;
        if shared.stream.borrow().is_active() {
            shared.link.send(&Message::RequestTelemetry { enable: true })?;
        }
        Ok(())
    }

    /// Detach the transport.
    ///
    /// Observers are only notified when the die was connected.
    pub fn disconnect(&self) {
        let shared = &self.shared;
        shared.link.detach();
        if !self.is_connected() {
            debug!("{}: disconnect while already disconnected", shared.name.borrow());
            return;
        }
        let state = shared.state.borrow_mut().disconnect();
        shared.observers.emit(&DieEvent::StateChanged(state));
        info!("{}: disconnected", shared.name.borrow());
    }

    /// Override the state without talking to the die or notifying anyone.
    pub fn force_state(&self, state: DieState) {
        info!("{}: forcing state to {:?}", self.shared.name.borrow(), state);
        self.shared.state.borrow_mut().force(state);
    }

    /// Feed one whole message received from the transport.
    ///
    /// Returns how many handlers it reached.
    pub fn on_bytes_received(&self, bytes: &[u8]) -> Result<usize> {
        if !self.is_connected() {
            error!(
                "{}: received {} bytes while disconnected",
                self.shared.name.borrow(),
                bytes.len()
            );
            return Err(Error::ProtocolViolation);
        }
        Ok(self.shared.link.receive(bytes)?)
    }

    // ── Observers ─────────────────────────────────────────────

    /// Receive every event this die emits.
    pub fn observe(&self, sink: impl EventSink + 'static) -> ObserverId {
        self.shared.observers.add(sink)
    }

    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.shared.observers.remove(id)
    }

    /// Register a telemetry consumer.
    ///
    /// The first subscription turns the die's stream on; dropping the last
    /// one turns it off. `sink` only sees [`DieEvent::Telemetry`].
    pub fn subscribe_telemetry(&self, mut sink: impl EventSink + 'static) -> TelemetrySubscription {
        let shared = &self.shared;
        let observer = shared.observers.add(move |event: &DieEvent| {
            if matches!(event, DieEvent::Telemetry(_)) {
                sink.emit(event);
            }
        });
        let first = shared.stream.borrow_mut().acquire();
        if first && self.is_connected() {
            shared.request_telemetry(true);
        }
        TelemetrySubscription {
            die: Rc::downgrade(shared),
            observer,
        }
    }

    pub fn telemetry_consumers(&self) -> usize {
        self.shared.stream.borrow().consumers()
    }

    // ── Commands ──────────────────────────────────────────────

    /// Ask the die to report its state; the reply arrives as an event.
    pub fn ping(&self) -> Result<()> {
        self.shared.link.send(&Message::RequestState)
    }

    pub fn play_animation(&self, animation: u8) -> Result<()> {
        self.shared.link.send(&Message::PlayAnim { animation })
    }

    /// Send any message and wait until the transport confirms it left.
    pub async fn send_confirmed(&self, message: &Message) -> Result<()> {
        let deadline = self.shared.config.transport_ack_deadline();
        self.shared
            .link
            .send_awaiting_transport_ack(message, deadline)
            .await
    }

    /// Ask for the state and wait for the answer.
    pub async fn request_state(&self, deadline: Deadline) -> Result<DieState> {
        match self
            .shared
            .link
            .send_awaiting_reply(&Message::RequestState, MessageType::State, deadline)
            .await?
        {
            Message::State { state } => Ok(state),
            _ => Err(Error::ProtocolViolation),
        }
    }

    /// Play `animation` and wait until it has finished.
    pub async fn flash(&self, animation: u8) -> Result<()> {
        self.shared
            .link
            .send_awaiting_reply(
                &Message::Flash { animation },
                MessageType::FlashFinished,
                Deadline::Default,
            )
            .await
            .map(drop)
    }

    /// Regenerate the default animation set in `color` (0x00RRGGBB).
    pub async fn program_default_anim_set(&self, color: u32) -> Result<()> {
        self.shared
            .link
            .send_awaiting_reply(
                &Message::ProgramDefaultAnimSet { color },
                MessageType::ProgramDefaultAnimSetFinished,
                Deadline::Default,
            )
            .await
            .map(drop)
    }

    pub async fn default_anim_set_color(&self) -> Result<u32> {
        match self
            .shared
            .link
            .send_awaiting_reply(
                &Message::RequestDefaultAnimSetColor,
                MessageType::DefaultAnimSetColor,
                Deadline::Default,
            )
            .await?
        {
            Message::DefaultAnimSetColor { color } => Ok(color),
            _ => Err(Error::ProtocolViolation),
        }
    }

    /// Store a new advertised name on the die.
    ///
    /// Names longer than 16 bytes are cut at a character boundary.
    pub async fn rename(&self, name: &str) -> Result<()> {
        let name: DieName = truncate_text(name);
        self.shared
            .link
            .send_awaiting_reply(
                &Message::Rename { name: name.clone() },
                MessageType::RenameFinished,
                Deadline::Default,
            )
            .await?;
        *self.shared.name.borrow_mut() = name.as_str().into();
        self.shared.observers.emit(&DieEvent::SettingsChanged);
        Ok(())
    }

    // ── Bulk ──────────────────────────────────────────────────

    pub async fn upload_bulk_data(&self, bytes: &[u8]) -> Result<()> {
        bulk::upload(&self.shared.link, bytes, Deadline::Default).await
    }

    /// Wait for the die to announce a payload and receive it.
    pub async fn download_bulk_data(&self) -> Result<Vec<u8>> {
        bulk::download(&self.shared.link, self.shared.config.bulk_deadline()).await
    }
}

impl core::fmt::Debug for Die {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Die")
            .field("name", &*self.shared.name.borrow())
            .field("address", &self.shared.address)
            .field("state", &self.state())
            .finish()
    }
}

/// Adapt a `DieShared` method into a handler that holds the die weakly.
fn inbound(
    die: &Weak<DieShared>,
    handle: fn(&DieShared, &Message),
) -> impl Fn(&Message) + 'static {
    let die = Weak::clone(die);
    move |message| {
        if let Some(die) = die.upgrade() {
            handle(&die, message);
        }
    }
}

impl DieShared {
    fn on_state(&self, message: &Message) {
        let Message::State { state } = message else {
            return;
        };
        let result = self.state.borrow_mut().report(*state);
        if let Ok(state) = result {
            self.observers.emit(&DieEvent::StateChanged(state));
        }
    }

    fn on_telemetry(&self, message: &Message) {
        let Message::Telemetry(telemetry) = message else {
            return;
        };
        if !self.stream.borrow().is_active() {
            debug!("{}: telemetry with no consumers, ignoring", self.name.borrow());
            return;
        }
        let samples = self.decoder.borrow_mut().decode(telemetry);
        for sample in samples {
            self.observers.emit(&DieEvent::Telemetry(sample));
        }
    }

    fn on_debug_log(&self, message: &Message) {
        let Message::DebugLog { text } = message else {
            return;
        };
        info!("{} says: {}", self.name.borrow(), text);
        self.observers.emit(&DieEvent::DebugLog(text.as_str().into()));
    }

    fn request_telemetry(&self, enable: bool) {
        if let Err(e) = self.link.send(&Message::RequestTelemetry { enable }) {
            warn!("{}: telemetry request ({}) not sent: {}", self.name.borrow(), enable, e);
        }
    }
}

/// Keeps the telemetry stream alive. Dropping it releases the consumer.
#[must_use = "telemetry stops when the subscription is dropped"]
pub struct TelemetrySubscription {
    die: Weak<DieShared>,
    observer: ObserverId,
}

impl Drop for TelemetrySubscription {
    fn drop(&mut self) {
        let Some(die) = self.die.upgrade() else {
            return;
        };
        die.observers.remove(self.observer);
        let last = die.stream.borrow_mut().release();
        if last && die.state.borrow().current().is_connected() {
            die.request_telemetry(false);
        }
    }
}
