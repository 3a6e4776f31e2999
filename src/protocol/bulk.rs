//! Bulk transfer: moving an arbitrary byte payload in 16-byte chunks.
//!
//! ```text
//!  sender                              receiver
//!    │── BulkSetup { size } ─────────────▶│  allocate `size` bytes
//!    │◀──────────────────── BulkSetupAck ─│
//!    │── BulkData { offset, size, data } ▶│  write at offset
//!    │◀───────────────────── BulkDataAck ─│
//!    │              ... until every byte is acknowledged ...
//! ```
//!
//! The uploader waits for each acknowledgment before sending the next
//! chunk. The downloader restarts its inactivity deadline on every
//! accepted chunk.

use core::cell::RefCell;
use std::rc::{Rc, Weak};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, info, warn};

use crate::error::{Error, Result};

use super::link::{Deadline, Link, PendingReply, within};
use super::message::{BULK_CHUNK_SIZE, BulkData, Message, MessageType};

/// Largest payload a single bulk transfer can describe.
pub const MAX_BULK_SIZE: usize = u16::MAX as usize;

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Send `bytes` to the peer, waiting for an acknowledgment after the
/// setup message and after every chunk.
pub async fn upload(link: &Link, bytes: &[u8], deadline: Deadline) -> Result<()> {
    let size = u16::try_from(bytes.len()).map_err(|_| {
        warn!("Bulk upload of {} bytes exceeds {}", bytes.len(), MAX_BULK_SIZE);
        Error::PayloadTooLarge(bytes.len())
    })?;

    link.send_awaiting_reply(
        &Message::BulkSetup { size },
        MessageType::BulkSetupAck,
        deadline,
    )
    .await?;

    for (index, chunk) in bytes.chunks(BULK_CHUNK_SIZE).enumerate() {
        // Fits: `size` bounds every offset.
        let offset = (index * BULK_CHUNK_SIZE) as u16;
        debug!("Bulk upload chunk @{} ({} bytes)", offset, chunk.len());
        link.send_awaiting_reply(
            &Message::BulkData(BulkData::new(offset, chunk)),
            MessageType::BulkDataAck,
            deadline,
        )
        .await?;
    }

    info!("Bulk upload complete ({} bytes)", size);
    Ok(())
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// Receive-side reassembly state, shared with the chunk handler.
struct Reassembly {
    buffer: Vec<u8>,
    covered: Vec<bool>,
    received: usize,
}

impl Reassembly {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0; size],
            covered: vec![false; size],
            received: 0,
        }
    }

    /// Write a chunk at its declared offset.
    ///
    /// Returns `false` when the chunk overruns the buffer. Only bytes not
    /// covered by an earlier chunk count towards completion.
    fn accept(&mut self, chunk: &BulkData) -> bool {
        let start = usize::from(chunk.offset);
        let payload = chunk.payload();
        let range = start..start + payload.len();
        let Some(slot) = self.buffer.get_mut(range.clone()) else {
            return false;
        };
        slot.copy_from_slice(payload);
        for covered in &mut self.covered[range] {
            if !*covered {
                *covered = true;
                self.received += 1;
            }
        }
        true
    }

    fn is_complete(&self) -> bool {
        self.received >= self.buffer.len()
    }
}

/// A download whose `BulkSetup` wait is already armed.
///
/// Arm before sending whatever makes the peer start the transfer, then
/// call [`BulkDownload::receive`].
pub struct BulkDownload {
    link: Weak<Link>,
    setup: PendingReply,
    deadline: Deadline,
}

impl BulkDownload {
    pub fn arm(link: &Rc<Link>, deadline: Deadline) -> Self {
        Self {
            link: Rc::downgrade(link),
            setup: link.expect(MessageType::BulkSetup, deadline),
            deadline,
        }
    }

    /// Accept the announced transfer and collect every chunk.
    pub async fn receive(self) -> Result<Vec<u8>> {
        let Message::BulkSetup { size } = self.setup.recv().await? else {
            return Err(Error::ProtocolViolation);
        };
        let link = self.link.upgrade().ok_or(Error::NotConnected)?;
        let size = usize::from(size);
        debug!("Bulk download announced ({} bytes)", size);

        let state = Rc::new(RefCell::new(Reassembly::new(size)));
        let progress: Rc<Signal<NoopRawMutex, ()>> = Rc::new(Signal::new());

        let _chunks = {
            let state = Rc::clone(&state);
            let progress = Rc::clone(&progress);
            let ack_link = Rc::downgrade(&link);
            link.on(MessageType::BulkData, move |message| {
                let Message::BulkData(chunk) = message else {
                    return;
                };
                if !state.borrow_mut().accept(chunk) {
                    warn!(
                        "Dropping bulk chunk @{} (+{}) past end of {}-byte buffer",
                        chunk.offset, chunk.size, size
                    );
                    return;
                }
                if let Some(link) = ack_link.upgrade() {
                    // A lost ack surfaces as a timeout on the sender.
                    let _ = link.send(&Message::BulkDataAck);
                }
                progress.signal(());
            })
        };

        link.send(&Message::BulkSetupAck)?;

        let limit = link.resolve(self.deadline);
        while !state.borrow().is_complete() {
            if within(limit, progress.wait()).await.is_none() {
                let received = state.borrow().received;
                warn!("Bulk download stalled at {}/{} bytes", received, size);
                return Err(Error::Timeout(MessageType::BulkData));
            }
        }

        info!("Bulk download complete ({} bytes)", size);
        let buffer = core::mem::take(&mut state.borrow_mut().buffer);
        Ok(buffer)
    }
}

/// Wait for the peer to announce and send a payload.
pub async fn download(link: &Rc<Link>, deadline: Deadline) -> Result<Vec<u8>> {
    BulkDownload::arm(link, deadline).receive().await
}
