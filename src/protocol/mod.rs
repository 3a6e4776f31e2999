//! Die wire protocol: codec, dispatch and request coordination.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     Protocol Stack                         │
//! │                                                            │
//! │  ┌───────────┐   ┌──────────┐   ┌───────────────────────┐  │
//! │  │ Transport │──▶│  Codec   │──▶│  DispatchTable        │  │
//! │  │ (trait)   │   │ (20 B)   │   │  → handlers / waits   │  │
//! │  └───────────┘   └──────────┘   └───────────────────────┘  │
//! │       ▲                                    │               │
//! │       │              ┌─────────────────────┘               │
//! │       │              ▼                                     │
//! │  ┌───────────┐   ┌──────────┐                              │
//! │  │   Link    │◀──│   Bulk   │   (chunked payloads)         │
//! │  │ (send/ack)│   │ transfer │                              │
//! │  └───────────┘   └──────────┘                              │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod bulk;
pub mod codec;
pub mod dispatch;
pub mod link;
pub mod loopback;
pub mod message;
pub mod transport;

pub use link::{Deadline, Link, PendingReply, Registration};
pub use message::{Message, MessageType};
pub use transport::TransportPort;
