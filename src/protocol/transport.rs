//! Transport port: the one capability the link needs from the radio.
//!
//! Concrete implementations live outside this crate:
//! - BLE GATT write characteristic (one message per write)
//! - in-process loopback for simulation ([`super::loopback`])
//!
//! The port is fire-and-forget from the link's point of view. It is
//! called exactly once per logical send and never retried here; delivery
//! confirmation, when requested, arrives through the callback.

/// Called by the transport once the bytes have physically left the host.
pub type DeliveryCallback = Box<dyn FnOnce()>;

/// Message-oriented transport channel to one die.
pub trait TransportPort {
    /// Queue one whole message for transmission.
    ///
    /// `on_delivered` fires after the message was transmitted (not after
    /// the die replied). It may be invoked from inside this call.
    fn send(&self, bytes: &[u8], on_delivered: Option<DeliveryCallback>);
}

/// A null transport that discards every message and reports it delivered.
/// Useful as a default when no die is attached.
pub struct NullTransport;

impl TransportPort for NullTransport {
    fn send(&self, _bytes: &[u8], on_delivered: Option<DeliveryCallback>) {
        if let Some(done) = on_delivered {
            done();
        }
    }
}
