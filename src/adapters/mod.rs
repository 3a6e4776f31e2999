//! Adapters: concrete implementations of the crate's port traits.
//!
//! | Adapter    | Implements | Connects to       |
//! |------------|------------|-------------------|
//! | `log_sink` | EventSink  | `log` facade      |
//!
//! Transports (`TransportPort`) for real radios live with the host
//! application; [`crate::protocol::loopback`] covers simulation.

pub mod log_sink;
