//! Bulk upload/download through the loopback transport.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use dicelink::Error;
use dicelink::config::DieConfig;
use dicelink::protocol::bulk::{self, BulkDownload, MAX_BULK_SIZE};
use dicelink::protocol::message::BULK_CHUNK_SIZE;
use dicelink::protocol::{Deadline, Message, MessageType};
use futures_lite::future;

use crate::sim::Rig;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

// ── Host → die ───────────────────────────────────────────────

#[test]
fn upload_arrives_intact_for_boundary_sizes() -> anyhow::Result<()> {
    for len in [0, 1, 16, 17, 1000] {
        let rig = Rig::new();
        let sent = payload(len);
        let incoming = BulkDownload::arm(&rig.peer, Deadline::Never);

        let (uploaded, received) = rig.run(future::zip(
            rig.die.upload_bulk_data(&sent),
            incoming.receive(),
        ));

        uploaded?;
        assert_eq!(received?, sent, "payload of {len} bytes");
        assert!(!rig.peer.dispatch().contains(MessageType::BulkData));
        assert!(!rig.die.link().dispatch().contains(MessageType::BulkDataAck));
    }
    Ok(())
}

#[test]
fn upload_sends_contiguous_chunks_in_order() -> anyhow::Result<()> {
    for len in [0, 1, 16, 17, 1000] {
        let rig = Rig::new();
        let sent = payload(len);

        let wire: Rc<RefCell<Vec<Message>>> = Rc::default();
        let record = |ty| {
            let wire = Rc::clone(&wire);
            rig.peer
                .on(ty, move |m: &Message| wire.borrow_mut().push(m.clone()))
        };
        let _setup = record(MessageType::BulkSetup);
        let _data = record(MessageType::BulkData);
        let incoming = BulkDownload::arm(&rig.peer, Deadline::Never);

        let (uploaded, received) = rig.run(future::zip(
            rig.die.upload_bulk_data(&sent),
            incoming.receive(),
        ));
        uploaded?;
        received?;

        let wire = wire.borrow();
        assert_eq!(
            wire.first(),
            Some(&Message::BulkSetup { size: len as u16 }),
            "{len} bytes"
        );
        let chunks: Vec<_> = wire[1..]
            .iter()
            .map(|m| match m {
                Message::BulkData(chunk) => (usize::from(chunk.offset), usize::from(chunk.size)),
                other => panic!("unexpected {other:?} in a {len}-byte upload"),
            })
            .collect();

        assert_eq!(chunks.len(), len.div_ceil(BULK_CHUNK_SIZE), "{len} bytes");
        let mut expected_offset = 0;
        for (offset, size) in &chunks {
            assert_eq!(*offset, expected_offset, "{len} bytes");
            assert!(*size > 0 && *size <= BULK_CHUNK_SIZE);
            expected_offset += size;
        }
        assert_eq!(expected_offset, len);
        if let Some((_, last)) = chunks.last() {
            let tail = match len % BULK_CHUNK_SIZE {
                0 => BULK_CHUNK_SIZE,
                rest => rest,
            };
            assert_eq!(*last, tail, "{len} bytes");
        }
    }
    Ok(())
}

// ── Die → host ───────────────────────────────────────────────

#[test]
fn download_arrives_intact_for_boundary_sizes() -> anyhow::Result<()> {
    for len in [0, 1, 16, 17, 1000] {
        let rig = Rig::new();
        let sent = payload(len);

        let (received, uploaded) = rig.run(future::zip(
            rig.die.download_bulk_data(),
            bulk::upload(&rig.peer, &sent, Deadline::Never),
        ));

        uploaded?;
        assert_eq!(received?, sent, "payload of {len} bytes");
        assert!(!rig.die.link().dispatch().contains(MessageType::BulkData));
    }
    Ok(())
}

#[test]
fn oversized_upload_is_rejected_before_sending() {
    let rig = Rig::new();
    let too_big = vec![0u8; MAX_BULK_SIZE + 1];
    let result = rig.run(rig.die.upload_bulk_data(&too_big));
    assert_eq!(result, Err(Error::PayloadTooLarge(MAX_BULK_SIZE + 1)));
    rig.flush();
}

#[test]
fn upload_to_silent_die_times_out_on_setup() {
    let rig = Rig::with_config(DieConfig {
        reply_timeout_ms: Some(100),
        ..DieConfig::default()
    });
    let result = rig.run(rig.die.upload_bulk_data(&[1, 2, 3]));
    assert_eq!(result, Err(Error::Timeout(MessageType::BulkSetupAck)));
    assert!(!rig.die.link().dispatch().contains(MessageType::BulkSetupAck));
}

#[test]
fn stalled_download_times_out_after_inactivity() {
    let rig = Rig::with_config(DieConfig {
        bulk_timeout_ms: Some(100),
        ..DieConfig::default()
    });
    // Announce 40 bytes, send only the first chunk.
    let script = async {
        let sender = async {
            rig.peer
                .send_awaiting_reply(
                    &dicelink::protocol::Message::BulkSetup { size: 40 },
                    MessageType::BulkSetupAck,
                    Deadline::Never,
                )
                .await?;
            rig.peer
                .send(&dicelink::protocol::Message::BulkData(
                    dicelink::protocol::message::BulkData::new(0, &[0xAB; 16]),
                ))?;
            Ok::<_, Error>(())
        };
        future::zip(rig.die.download_bulk_data(), sender).await
    };

    let started = std::time::Instant::now();
    let (received, sent) = rig.run(script);
    assert_eq!(sent, Ok(()));
    assert_eq!(received, Err(Error::Timeout(MessageType::BulkData)));
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(!rig.die.link().dispatch().contains(MessageType::BulkData));
}
