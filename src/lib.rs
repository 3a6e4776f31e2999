//! Host-side communication core for a Bluetooth LE smart die.
//!
//! Exposes the message protocol, the request/acknowledgment machinery and
//! the [`Die`](die::Die) connection handle. The radio itself is an
//! external [`TransportPort`](protocol::TransportPort); this crate never
//! installs a logger or spawns a thread.

#![deny(unused_must_use)]

pub mod adapters;
pub mod animation;
pub mod config;
pub mod die;
pub mod error;
pub mod protocol;

pub use error::{DecodeError, Error, Result};
