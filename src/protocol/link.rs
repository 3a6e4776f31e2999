//! Request / acknowledgment / timeout coordination over one transport.
//!
//! ```text
//!            send()                    ┌──────────────┐
//!  caller ─────────────▶ codec ──────▶ │ TransportPort│
//!     ▲                                └──────┬───────┘
//!     │ PendingReply (Signal)                 │ receive(bytes)
//!     │                                       ▼
//!     └──────────── DispatchTable ◀──── codec::decode
//! ```
//!
//! A [`Link`] offers four primitives on top of the dispatch table:
//! fire-and-forget [`Link::send`], [`Link::send_awaiting_transport_ack`],
//! [`Link::send_awaiting_reply`] and [`Link::wait_for`]. Replies are
//! caught by a one-shot waiter ([`PendingReply`]) that is registered
//! **before** anything is sent, so a reply that is routed before the
//! caller suspends is never lost. The waiter's handler is unregistered
//! when it resolves, times out, or is dropped.
//!
//! Everything here runs on one cooperative executor: `Rc`, `RefCell`
//! and `NoopRawMutex`, no threads.

use core::cell::RefCell;
use core::future::Future;
use core::time::Duration;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{debug, warn};

use crate::error::{DecodeError, Error, Result};

use super::codec;
use super::dispatch::{DispatchTable, HandlerId};
use super::message::{Message, MessageType};
use super::transport::TransportPort;

// ---------------------------------------------------------------------------
// Deadlines
// ---------------------------------------------------------------------------

/// How long a wait may suspend before it gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deadline {
    /// Use the link's configured default.
    #[default]
    Default,
    /// Give up after this long.
    After(Duration),
    /// Wait indefinitely. Only for exchanges the caller can cancel by
    /// dropping the future.
    Never,
}

impl Deadline {
    pub fn millis(ms: u64) -> Self {
        Self::After(Duration::from_millis(ms))
    }

    /// `None` in config means "no timeout".
    pub fn from_config_ms(ms: Option<u32>) -> Self {
        ms.map_or(Self::Never, |ms| Self::millis(u64::from(ms)))
    }
}

/// Run `fut` to completion unless `limit` elapses first.
pub(crate) async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        None => Some(fut.await),
        Some(limit) => {
            future::or(async { Some(fut.await) }, async {
                async_io_mini::Timer::after(limit).await;
                None
            })
            .await
        }
    }
}

// ---------------------------------------------------------------------------
// Registrations
// ---------------------------------------------------------------------------

/// A dispatch handler that stays registered for the lifetime of this value.
#[must_use = "the handler is unregistered when the registration is dropped"]
pub struct Registration {
    table: Rc<DispatchTable>,
    ty: MessageType,
    id: HandlerId,
}

impl Registration {
    pub fn message_type(&self) -> MessageType {
        self.ty
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.table.unregister(self.ty, self.id);
    }
}

// ---------------------------------------------------------------------------
// Pending reply
// ---------------------------------------------------------------------------

type Slot<T> = Signal<NoopRawMutex, T>;

/// A one-shot waiter for the next message of one type.
///
/// Created by [`Link::expect`]; its dispatch handler is live from
/// creation until the value is dropped.
pub struct PendingReply {
    registration: Registration,
    slot: Rc<Slot<Message>>,
    limit: Option<Duration>,
}

impl PendingReply {
    pub fn message_type(&self) -> MessageType {
        self.registration.ty
    }

    /// Whether the awaited message has already been routed.
    pub fn is_ready(&self) -> bool {
        self.slot.signaled()
    }

    /// Suspend until the message arrives or the deadline elapses.
    ///
    /// The deadline was resolved against the link default when the wait
    /// was armed. The handler is unregistered on return either way.
    pub async fn recv(self) -> Result<Message> {
        match within(self.limit, self.slot.wait()).await {
            Some(message) => Ok(message),
            None => {
                let ty = self.message_type();
                warn!("Timed out waiting for {:?}", ty);
                Err(Error::Timeout(ty))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// Coordinates sends and replies for one die connection.
pub struct Link {
    port: RefCell<Option<Rc<dyn TransportPort>>>,
    table: Rc<DispatchTable>,
    default_deadline: Option<Duration>,
}

impl Link {
    /// Create a detached link. `default_deadline` resolves
    /// [`Deadline::Default`]; `None` means waits are unbounded by default.
    pub fn new(default_deadline: Option<Duration>) -> Self {
        Self {
            port: RefCell::new(None),
            table: Rc::new(DispatchTable::new()),
            default_deadline,
        }
    }

    // ── Port lifecycle ────────────────────────────────────────

    pub fn attach(&self, port: Rc<dyn TransportPort>) {
        *self.port.borrow_mut() = Some(port);
    }

    /// Drop the port. Returns `false` if none was attached.
    pub fn detach(&self) -> bool {
        self.port.borrow_mut().take().is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.port.borrow().is_some()
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.table
    }

    pub fn resolve(&self, deadline: Deadline) -> Option<Duration> {
        match deadline {
            Deadline::Default => self.default_deadline,
            Deadline::After(limit) => Some(limit),
            Deadline::Never => None,
        }
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Decode one whole message and route it to every interested handler.
    ///
    /// Returns the number of handlers that ran.
    pub fn receive(&self, bytes: &[u8]) -> core::result::Result<usize, DecodeError> {
        let message = codec::decode(bytes).inspect_err(|e| {
            warn!("Dropping undecodable message ({} bytes): {}", bytes.len(), e);
        })?;
        debug!("<- {:?}", message.message_type());
        Ok(self.table.route(&message))
    }

    // ── Outbound primitives ───────────────────────────────────

    /// Encode and hand to the transport. No tracking.
    pub fn send(&self, message: &Message) -> Result<()> {
        self.transmit(message, None)
    }

    /// Send and suspend until the transport reports the bytes delivered.
    pub async fn send_awaiting_transport_ack(
        &self,
        message: &Message,
        deadline: Deadline,
    ) -> Result<()> {
        let delivered: Rc<Slot<()>> = Rc::new(Signal::new());
        let done = Rc::clone(&delivered);
        self.transmit(message, Some(Box::new(move || done.signal(()))))?;

        let ty = message.message_type();
        within(self.resolve(deadline), delivered.wait())
            .await
            .ok_or_else(|| {
                warn!("Transport never confirmed delivery of {:?}", ty);
                Error::Timeout(ty)
            })
    }

    /// Register `handler` for `ty` until the returned guard is dropped.
    pub fn on(&self, ty: MessageType, handler: impl Fn(&Message) + 'static) -> Registration {
        let id = self.table.register(ty, handler);
        Registration {
            table: Rc::clone(&self.table),
            ty,
            id,
        }
    }

    /// Arm a one-shot waiter for the next message of type `ty`.
    ///
    /// The handler is registered immediately; send whatever provokes the
    /// reply afterwards, then `recv()` the returned wait.
    pub fn expect(&self, ty: MessageType, deadline: Deadline) -> PendingReply {
        let slot: Rc<Slot<Message>> = Rc::new(Signal::new());
        let sink = Rc::clone(&slot);
        PendingReply {
            registration: self.on(ty, move |message| sink.signal(message.clone())),
            slot,
            limit: self.resolve(deadline),
        }
    }

    /// Send `message` and suspend until a `reply` arrives or the deadline
    /// passes. The waiter is armed before the send.
    pub async fn send_awaiting_reply(
        &self,
        message: &Message,
        reply: MessageType,
        deadline: Deadline,
    ) -> Result<Message> {
        let pending = self.expect(reply, deadline);
        self.send(message)?;
        pending.recv().await
    }

    /// Suspend until the peer sends a message of type `ty`.
    pub async fn wait_for(&self, ty: MessageType, deadline: Deadline) -> Result<Message> {
        self.expect(ty, deadline).recv().await
    }

    fn transmit(
        &self,
        message: &Message,
        on_delivered: Option<super::transport::DeliveryCallback>,
    ) -> Result<()> {
        // Clone the port out so no borrow is held while the transport runs;
        // a loopback may re-enter this link from inside `send`.
        let port = self.port.borrow().clone().ok_or_else(|| {
            warn!("Cannot send {:?}: no transport attached", message.message_type());
            Error::NotConnected
        })?;
        let frame = codec::encode(message);
        debug!("-> {:?} ({} bytes)", message.message_type(), frame.len());
        port.send(&frame, on_delivered);
        Ok(())
    }
}
