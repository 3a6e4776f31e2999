//! In-process transport pair for simulation and tests.
//!
//! ```text
//!  ┌────────────┐  port.send ─▶ queue B ─▶ pump  ┌────────────┐
//!  │ endpoint A │                                │ endpoint B │
//!  └────────────┘  pump ◀─ queue A ◀─ port.send  └────────────┘
//! ```
//!
//! Each endpoint owns a bounded `embassy-sync` channel as its inbox.
//! Sending enqueues a copy of the bytes into the *other* endpoint's inbox
//! and reports delivery immediately; a full inbox drops the message and
//! never reports it delivered. Nothing moves until the receiving side's
//! [`Endpoint::pump`] future is polled.

use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use super::transport::{DeliveryCallback, TransportPort};

/// Messages an inbox can hold before sends start failing.
pub const QUEUE_DEPTH: usize = 32;

type Queue = Channel<NoopRawMutex, Vec<u8>, QUEUE_DEPTH>;

/// The sending half of an endpoint, handed to a `Link` or `Die`.
pub struct LoopbackPort {
    name: &'static str,
    peer_inbox: Rc<Queue>,
}

impl TransportPort for LoopbackPort {
    fn send(&self, bytes: &[u8], on_delivered: Option<DeliveryCallback>) {
        match self.peer_inbox.try_send(bytes.to_vec()) {
            Ok(()) => {
                if let Some(done) = on_delivered {
                    done();
                }
            }
            Err(_) => warn!("{}: peer inbox full, dropping {} bytes", self.name, bytes.len()),
        }
    }
}

/// One side of a loopback connection.
pub struct Endpoint {
    port: Rc<LoopbackPort>,
    inbox: Rc<Queue>,
}

impl Endpoint {
    /// The transport to attach on this side.
    pub fn port(&self) -> Rc<dyn TransportPort> {
        self.port.clone()
    }

    /// Messages waiting to be pumped on this side.
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Deliver every message that arrives for this side, forever.
    ///
    /// Run it on the same executor as the code driving the other side;
    /// drop it to stop.
    pub async fn pump<F: FnMut(&[u8])>(&self, mut deliver: F) {
        loop {
            let bytes = self.inbox.receive().await;
            deliver(&bytes);
        }
    }

    /// Deliver whatever is queued right now without waiting for more.
    pub fn drain<F: FnMut(&[u8])>(&self, mut deliver: F) -> usize {
        let mut delivered = 0;
        while let Ok(bytes) = self.inbox.try_receive() {
            deliver(&bytes);
            delivered += 1;
        }
        delivered
    }
}

/// Two connected endpoints, conventionally host and die.
pub fn pair() -> (Endpoint, Endpoint) {
    let a_inbox: Rc<Queue> = Rc::new(Channel::new());
    let b_inbox: Rc<Queue> = Rc::new(Channel::new());
    let a = Endpoint {
        port: Rc::new(LoopbackPort {
            name: "loopback-a",
            peer_inbox: Rc::clone(&b_inbox),
        }),
        inbox: a_inbox.clone(),
    };
    let b = Endpoint {
        port: Rc::new(LoopbackPort {
            name: "loopback-b",
            peer_inbox: a_inbox,
        }),
        inbox: b_inbox,
    };
    (a, b)
}
