//! Connection state machine and telemetry streaming, end to end.

use std::cell::RefCell;
use std::rc::Rc;

use dicelink::Error;
use dicelink::adapters::log_sink::LogEventSink;
use dicelink::die::events::DieEvent;
use dicelink::die::state::DieState;
use dicelink::die::telemetry::{Acceleration, TelemetrySample};
use dicelink::protocol::codec;
use dicelink::protocol::message::{AccelFrame, Telemetry};
use dicelink::protocol::{Deadline, Message, MessageType};

use crate::sim::{Rig, settle};

fn recorder() -> (Rc<RefCell<Vec<DieEvent>>>, impl FnMut(&DieEvent) + 'static) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = {
        let events = Rc::clone(&events);
        move |e: &DieEvent| events.borrow_mut().push(e.clone())
    };
    (events, sink)
}

fn telemetry(x: i16, dt: u16) -> Message {
    let frame = AccelFrame {
        x,
        y: 0,
        z: 0,
        delta_time_ms: dt,
    };
    Message::Telemetry(Telemetry {
        frames: [frame, frame],
    })
}

// ── State ────────────────────────────────────────────────────

#[test]
fn reported_states_flow_through_to_observers() -> anyhow::Result<()> {
    let rig = Rig::new();
    let (events, sink) = recorder();
    rig.die.observe(sink);
    rig.die.observe(LogEventSink::new("D6-sim"));

    assert_eq!(rig.die.state(), DieState::Unknown);
    rig.run(async {
        for state in [DieState::Handling, DieState::Rolling, DieState::Face6] {
            rig.peer.send(&Message::State { state })?;
        }
        settle().await;
        Ok::<_, Error>(())
    })?;

    assert_eq!(rig.die.face(), Some(6));
    assert_eq!(
        *events.borrow(),
        vec![
            DieEvent::StateChanged(DieState::Handling),
            DieEvent::StateChanged(DieState::Rolling),
            DieEvent::StateChanged(DieState::Face6),
        ]
    );
    Ok(())
}

#[test]
fn disconnect_then_traffic_is_a_protocol_violation() {
    let rig = Rig::new();
    let (events, sink) = recorder();
    rig.die.observe(sink);

    rig.die.disconnect();
    assert_eq!(rig.die.state(), DieState::Disconnected);
    assert_eq!(
        *events.borrow(),
        vec![DieEvent::StateChanged(DieState::Disconnected)]
    );

    let bytes = codec::encode(&Message::State {
        state: DieState::Face1,
    });
    assert_eq!(
        rig.die.on_bytes_received(&bytes),
        Err(Error::ProtocolViolation)
    );
    assert_eq!(rig.die.state(), DieState::Disconnected);
    assert_eq!(rig.die.ping(), Err(Error::NotConnected));
}

#[test]
fn force_state_does_not_reach_the_die() {
    let rig = Rig::new();
    let (events, sink) = recorder();
    rig.die.observe(sink);

    rig.die.force_state(DieState::Face3);

    assert_eq!(rig.die.state(), DieState::Face3);
    assert_eq!(rig.queued_for_peer(), 0);
    assert!(events.borrow().is_empty());
}

// ── Telemetry ────────────────────────────────────────────────

#[test]
fn full_scale_sample_decodes_to_eight_g() -> anyhow::Result<()> {
    let rig = Rig::new();
    let (events, sink) = recorder();
    let start = rig.peer.expect(MessageType::RequestTelemetry, Deadline::Never);
    let _subscription = rig.die.subscribe_telemetry(sink);

    rig.run(async {
        assert_eq!(start.recv().await?, Message::RequestTelemetry { enable: true });
        let arrived = rig.die.link().expect(MessageType::Telemetry, Deadline::Never);
        rig.peer.send(&telemetry(2048, 10))?;
        arrived.recv().await?;
        Ok::<_, Error>(())
    })?;

    let expected = |t| {
        DieEvent::Telemetry(TelemetrySample {
            acceleration: Acceleration {
                x: 8.0,
                y: 0.0,
                z: 0.0,
            },
            timestamp_ms: t,
        })
    };
    assert_eq!(*events.borrow(), vec![expected(10), expected(20)]);
    Ok(())
}

#[test]
fn stream_starts_once_and_stops_with_last_subscriber() -> anyhow::Result<()> {
    let rig = Rig::new();
    let requests = Rc::new(RefCell::new(Vec::new()));
    {
        let requests = Rc::clone(&requests);
        rig.peer
            .dispatch()
            .register(MessageType::RequestTelemetry, move |m| {
                requests.borrow_mut().push(m.clone());
            });
    }

    let first = rig.die.subscribe_telemetry(|_: &DieEvent| {});
    let second = rig.die.subscribe_telemetry(|_: &DieEvent| {});
    rig.flush();
    assert_eq!(
        *requests.borrow(),
        vec![Message::RequestTelemetry { enable: true }]
    );

    drop(first);
    rig.flush();
    assert_eq!(requests.borrow().len(), 1);

    drop(second);
    rig.flush();
    assert_eq!(
        *requests.borrow(),
        vec![
            Message::RequestTelemetry { enable: true },
            Message::RequestTelemetry { enable: false },
        ]
    );
    Ok(())
}

#[test]
fn telemetry_without_subscribers_is_ignored() {
    let rig = Rig::new();
    let (events, sink) = recorder();
    rig.die.observe(sink);

    rig.peer.send(&telemetry(1024, 5)).unwrap();
    rig.flush();

    assert!(events.borrow().is_empty());
}

#[test]
fn debug_log_from_die_is_forwarded() -> anyhow::Result<()> {
    let rig = Rig::new();
    let (events, sink) = recorder();
    rig.die.observe(sink);

    rig.peer.send(&Message::DebugLog {
        text: dicelink::protocol::message::truncate_text("imu calibrated"),
    })?;
    rig.flush();

    assert_eq!(
        *events.borrow(),
        vec![DieEvent::DebugLog("imu calibrated".into())]
    );
    Ok(())
}
