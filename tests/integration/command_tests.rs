//! Request/reply commands and the timeout machinery behind them.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use dicelink::Error;
use dicelink::die::events::DieEvent;
use dicelink::die::state::DieState;
use dicelink::protocol::{Deadline, Message, MessageType};
use futures_lite::future;

use crate::sim::Rig;

// ── Timeouts ─────────────────────────────────────────────────

#[test]
fn silent_die_times_out_in_about_the_deadline() {
    let rig = Rig::new();
    let started = Instant::now();
    let result = rig.run(rig.die.link().send_awaiting_reply(
        &Message::RequestDefaultAnimSetColor,
        MessageType::DefaultAnimSetColor,
        Deadline::millis(100),
    ));
    let elapsed = started.elapsed();

    assert_eq!(result, Err(Error::Timeout(MessageType::DefaultAnimSetColor)));
    assert!(elapsed >= Duration::from_millis(100), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "returned after {elapsed:?}");
    assert!(!rig.die.link().dispatch().contains(MessageType::DefaultAnimSetColor));
}

#[test]
fn dropped_wait_leaves_no_handler() {
    let rig = Rig::new();
    // The race is won by the short sleep; the flash wait is dropped mid-flight.
    let outcome = rig.run(future::or(
        async { rig.die.flash(1).await.map(|()| "flashed") },
        async {
            async_io_mini::Timer::after(Duration::from_millis(20)).await;
            Ok("cancelled")
        },
    ));
    assert_eq!(outcome, Ok("cancelled"));
    assert!(!rig.die.link().dispatch().contains(MessageType::FlashFinished));
}

// ── Commands ─────────────────────────────────────────────────

#[test]
fn flash_waits_for_finished() -> anyhow::Result<()> {
    let rig = Rig::new();
    let request = rig.peer.expect(MessageType::Flash, Deadline::Never);

    let (flashed, seen) = rig.run(future::zip(rig.die.flash(4), async {
        let seen = request.recv().await?;
        rig.peer.send(&Message::FlashFinished)?;
        Ok::<_, Error>(seen)
    }));

    flashed?;
    assert_eq!(seen?, Message::Flash { animation: 4 });
    Ok(())
}

#[test]
fn default_anim_set_color_round_trip() -> anyhow::Result<()> {
    let rig = Rig::new();
    let request = rig
        .peer
        .expect(MessageType::RequestDefaultAnimSetColor, Deadline::Never);

    let (color, replied) = rig.run(future::zip(rig.die.default_anim_set_color(), async {
        request.recv().await?;
        rig.peer
            .send(&Message::DefaultAnimSetColor { color: 0x00FF_8000 })
    }));

    replied?;
    assert_eq!(color?, 0x00FF_8000);
    Ok(())
}

#[test]
fn program_default_anim_set_sends_color() -> anyhow::Result<()> {
    let rig = Rig::new();
    let request = rig
        .peer
        .expect(MessageType::ProgramDefaultAnimSet, Deadline::Never);

    let (programmed, seen) = rig.run(future::zip(
        rig.die.program_default_anim_set(0x0000_00FF),
        async {
            let seen = request.recv().await?;
            rig.peer.send(&Message::ProgramDefaultAnimSetFinished)?;
            Ok::<_, Error>(seen)
        },
    ));

    programmed?;
    assert_eq!(seen?, Message::ProgramDefaultAnimSet { color: 0xFF });
    Ok(())
}

#[test]
fn rename_updates_local_name_and_notifies() -> anyhow::Result<()> {
    let rig = Rig::new();
    let events = Rc::new(RefCell::new(Vec::new()));
    {
        let events = Rc::clone(&events);
        rig.die
            .observe(move |e: &DieEvent| events.borrow_mut().push(e.clone()));
    }
    let request = rig.peer.expect(MessageType::Rename, Deadline::Never);

    let (renamed, seen) = rig.run(future::zip(
        rig.die.rename("a name far longer than sixteen bytes"),
        async {
            let seen = request.recv().await?;
            rig.peer.send(&Message::RenameFinished)?;
            Ok::<_, Error>(seen)
        },
    ));

    renamed?;
    let Message::Rename { name } = seen? else {
        anyhow::bail!("peer saw the wrong message");
    };
    assert_eq!(name.as_str(), "a name far longe");
    assert_eq!(rig.die.name(), "a name far longe");
    assert_eq!(*events.borrow(), vec![DieEvent::SettingsChanged]);
    Ok(())
}

#[test]
fn request_state_returns_and_applies_reported_state() -> anyhow::Result<()> {
    let rig = Rig::new();
    let request = rig.peer.expect(MessageType::RequestState, Deadline::Never);

    let (state, replied) = rig.run(future::zip(
        rig.die.request_state(Deadline::Default),
        async {
            request.recv().await?;
            rig.peer.send(&Message::State {
                state: DieState::Face2,
            })
        },
    ));

    replied?;
    assert_eq!(state?, DieState::Face2);
    assert_eq!(rig.die.face(), Some(2));
    Ok(())
}

#[test]
fn play_animation_is_fire_and_forget() -> anyhow::Result<()> {
    let rig = Rig::new();
    let request = rig.peer.expect(MessageType::PlayAnim, Deadline::Never);

    rig.die.play_animation(9)?;
    let seen = rig.run(request.recv())?;

    assert_eq!(seen, Message::PlayAnim { animation: 9 });
    Ok(())
}

#[test]
fn send_confirmed_resolves_on_transport_delivery() -> anyhow::Result<()> {
    let rig = Rig::new();
    rig.run(rig.die.send_confirmed(&Message::RequestTelemetry { enable: false }))?;
    rig.flush();
    Ok(())
}

#[test]
fn different_types_can_be_awaited_concurrently() -> anyhow::Result<()> {
    let rig = Rig::new();
    let flash = rig.peer.expect(MessageType::Flash, Deadline::Never);
    let color = rig
        .peer
        .expect(MessageType::RequestDefaultAnimSetColor, Deadline::Never);

    let ((flashed, read), replied) = rig.run(future::zip(
        future::zip(rig.die.flash(0), rig.die.default_anim_set_color()),
        async {
            flash.recv().await?;
            color.recv().await?;
            // Answer out of order.
            rig.peer.send(&Message::DefaultAnimSetColor { color: 7 })?;
            rig.peer.send(&Message::FlashFinished)
        },
    ));

    replied?;
    flashed?;
    assert_eq!(read?, 7);
    Ok(())
}
