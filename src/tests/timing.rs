//! Timing engine scenarios
//!
//! Most tests step the engine by hand: set the manual clock, then run one
//! reconciliation pass with an explicit wall instant. The async ones run
//! the real loop on paused tokio time.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::fixtures::{self, cue, RecordingRenderer, RenderEvent, VirtualClock};
use crate::config::EngineConfig;
use crate::engine::clock::ManualClock;
use crate::engine::mailbox::{self, Message};
use crate::engine::{Engine, Source};
use crate::error::RenderError;
use crate::renderer::{AspectMode, DvdLayout, RenderContent, SubtitleRenderer};
use crate::subtitle::cue::{Cue, Dimension, ImagePayload, Rect};

fn step(engine: &mut Engine, clock: &ManualClock, at_ms: i64, wall: Instant) {
    clock.set(at_ms);
    engine.reconcile(wall);
}

fn image_cue(start: i64, stop: i64, rect: Rect) -> Cue {
    let size = (rect.width * rect.height) as usize;
    Cue::image(start, stop, ImagePayload::new(vec![1u8; size], rect))
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

#[test]
fn test_cues_show_and_hide_on_their_deadlines() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(100, 900, "first")), wall);
    engine.dispatch(Message::Push(cue(1200, 1800, "second")), wall);

    step(&mut engine, &clock, 0, wall);
    assert_eq!(renderer.visible(), None);
    assert!(engine.has_pending());

    step(&mut engine, &clock, 100, wall);
    assert_eq!(renderer.visible().as_deref(), Some("first"));
    assert_eq!(engine.current_stop(), Some(900));

    step(&mut engine, &clock, 900, wall);
    assert_eq!(renderer.visible(), None);
    assert!(!engine.is_showing());

    step(&mut engine, &clock, 1200, wall);
    assert_eq!(renderer.visible().as_deref(), Some("second"));

    step(&mut engine, &clock, 1800, wall);
    assert_eq!(renderer.visible(), None);
    assert_eq!(renderer.shows(), 2);
}

#[test]
fn test_backward_clock_reshows_earlier_cue() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(100, 900, "first")), wall);
    engine.dispatch(Message::Push(cue(1200, 1800, "second")), wall);

    step(&mut engine, &clock, 1000, wall);
    assert_eq!(engine.next_index(), 1);
    step(&mut engine, &clock, 2000, wall);
    assert!(!engine.has_pending());

    // Seek back
    step(&mut engine, &clock, 500, wall);
    assert_eq!(renderer.visible().as_deref(), Some("first"));
    assert_eq!(engine.current_stop(), Some(900));
    // The cue after it is already prepared
    assert!(engine.has_pending());
    assert_eq!(renderer.prepared_labels().last().map(String::as_str), Some("second"));
}

#[test]
fn test_overshoot_skips_expired_cues() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(0, 100, "first")), wall);
    engine.dispatch(Message::Push(cue(5000, 5100, "second")), wall);

    step(&mut engine, &clock, 50, wall);
    assert_eq!(renderer.visible().as_deref(), Some("first"));

    // Scheduling stall past both cues
    step(&mut engine, &clock, 6000, wall);
    assert_eq!(renderer.visible(), None);
    assert_eq!(renderer.shows(), 1);
    assert!(!engine.has_pending());
}

#[test]
fn test_overshoot_into_second_cue() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(0, 100, "first")), wall);
    engine.dispatch(Message::Push(cue(5000, 5100, "second")), wall);

    step(&mut engine, &clock, 50, wall);
    step(&mut engine, &clock, 5050, wall);
    assert_eq!(renderer.visible().as_deref(), Some("second"));
    assert_eq!(engine.current_stop(), Some(5100));
}

#[test]
fn test_osd_overrides_due_cue_until_expiry() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let t0 = Instant::now();

    engine.dispatch(Message::Push(cue(1000, 3000, "cue")), t0);
    step(&mut engine, &clock, 500, t0);

    engine.dispatch(
        Message::DisplayText {
            lines: vec!["Paused".to_string()],
            duration_ms: 1000,
        },
        t0,
    );
    assert!(engine.is_osd_active());
    assert_eq!(renderer.visible().as_deref(), Some("Paused"));

    // The cue is due but the message is still up
    step(&mut engine, &clock, 1500, t0 + ms(500));
    assert_eq!(renderer.visible().as_deref(), Some("Paused"));
    assert!(engine.is_osd_active());

    step(&mut engine, &clock, 2000, t0 + ms(1000));
    assert!(!engine.is_osd_active());
    assert_eq!(renderer.visible().as_deref(), Some("cue"));
}

#[test]
fn test_cue_returns_after_osd() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let t0 = Instant::now();

    engine.dispatch(Message::Push(cue(0, 5000, "long cue")), t0);
    step(&mut engine, &clock, 1000, t0);
    assert_eq!(renderer.visible().as_deref(), Some("long cue"));

    engine.dispatch(
        Message::DisplayText {
            lines: vec!["Subtitle delay: 250 ms".to_string()],
            duration_ms: 500,
        },
        t0,
    );
    step(&mut engine, &clock, 1100, t0 + ms(100));
    assert_eq!(renderer.visible().as_deref(), Some("Subtitle delay: 250 ms"));

    step(&mut engine, &clock, 1500, t0 + ms(500));
    assert_eq!(renderer.visible().as_deref(), Some("long cue"));
}

#[test]
fn test_osd_lines_are_parsed_for_tags() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);

    engine.dispatch(
        Message::DisplayText {
            lines: vec!["<b>Subtitle</b> file".to_string(), "two".to_string()],
            duration_ms: 1000,
        },
        Instant::now(),
    );
    assert_eq!(renderer.visible().as_deref(), Some("Subtitle file\ntwo"));
}

#[test]
fn test_timeout_capped_when_idle() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.reconcile(wall);
    assert_eq!(engine.next_timeout(wall), ms(1000));
}

#[test]
fn test_timeout_follows_next_start() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(1200, 2000, "next")), wall);
    step(&mut engine, &clock, 1000, wall);
    assert_eq!(engine.next_timeout(wall), ms(200));

    // Deadline already passed without a reconciliation
    clock.set(1300);
    assert_eq!(engine.next_timeout(wall), Duration::ZERO);
}

#[test]
fn test_timeout_waits_for_visible_cue_to_end() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(1000, 1500, "a")), wall);
    engine.dispatch(Message::Push(cue(1400, 2000, "b")), wall);
    step(&mut engine, &clock, 1100, wall);
    assert_eq!(renderer.visible().as_deref(), Some("a"));

    // "b" starts at 1400 but cannot replace "a" before 1500
    assert_eq!(engine.next_timeout(wall), ms(400));

    step(&mut engine, &clock, 1450, wall);
    assert_eq!(renderer.visible().as_deref(), Some("a"));
    assert_eq!(engine.next_timeout(wall), ms(50));

    step(&mut engine, &clock, 1500, wall);
    assert_eq!(renderer.visible().as_deref(), Some("b"));
}

#[test]
fn test_timeout_while_paused_uses_cap() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(1200, 2000, "next")), wall);
    step(&mut engine, &clock, 1000, wall);

    engine.dispatch(Message::SetPaused(true), wall);
    assert!(engine.is_paused());
    assert_eq!(engine.next_timeout(wall), ms(1000));

    engine.dispatch(Message::SetPaused(false), wall);
    assert_eq!(engine.next_timeout(wall), ms(200));
}

#[test]
fn test_timeout_during_osd_tracks_expiry_only() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let t0 = Instant::now();

    engine.dispatch(Message::Push(cue(1200, 2000, "next")), t0);
    step(&mut engine, &clock, 1000, t0);

    engine.dispatch(
        Message::DisplayText {
            lines: vec!["Subtitle stream: 2".to_string()],
            duration_ms: 300,
        },
        t0,
    );
    assert_eq!(engine.next_timeout(t0), ms(300));
    assert_eq!(engine.next_timeout(t0 + ms(300)), Duration::ZERO);
}

#[test]
fn test_osd_wait_rounds_up_to_expiry() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let t0 = Instant::now();

    engine.dispatch(
        Message::DisplayText {
            lines: vec!["Subtitle delay: 250 ms".to_string()],
            duration_ms: 300,
        },
        t0,
    );

    // Part of a millisecond left still waits a whole one
    let almost = t0 + Duration::from_micros(299_600);
    assert_eq!(engine.next_timeout(almost), ms(1));
    assert_eq!(engine.next_timeout(t0 + Duration::from_micros(100_400)), ms(200));

    // Waking after that wait finds the message expired
    engine.reconcile(almost + ms(1));
    assert!(!engine.is_osd_active());
}

#[test]
fn test_delay_shifts_effective_time() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(1000, 2000, "cue")), wall);
    step(&mut engine, &clock, 1500, wall);
    assert_eq!(renderer.visible().as_deref(), Some("cue"));

    engine.dispatch(Message::SetDelay(1000), wall);
    assert_eq!(engine.delay(), 1000);
    step(&mut engine, &clock, 1500, wall);
    assert_eq!(engine.now(), 500);
    assert_eq!(renderer.visible(), None);

    step(&mut engine, &clock, 2000, wall);
    assert_eq!(renderer.visible().as_deref(), Some("cue"));

    // Negative delay shows subtitles earlier
    engine.dispatch(Message::SetDelay(-500), wall);
    step(&mut engine, &clock, 2600, wall);
    assert_eq!(renderer.visible(), None);
    step(&mut engine, &clock, 600, wall);
    assert_eq!(renderer.visible().as_deref(), Some("cue"));
}

#[test]
fn test_toggle_between_sources() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(0, 5000, "internal")), wall);
    engine.dispatch(
        Message::SendExternalSubs(vec![cue(0, 5000, "external")]),
        wall,
    );
    assert_eq!(engine.source(), Source::External);

    step(&mut engine, &clock, 100, wall);
    assert_eq!(renderer.visible().as_deref(), Some("external"));

    engine.dispatch(Message::ToggleExternalSubs(false), wall);
    step(&mut engine, &clock, 200, wall);
    assert_eq!(engine.source(), Source::Internal);
    assert_eq!(renderer.visible().as_deref(), Some("internal"));

    // Both timelines survive the toggle
    engine.dispatch(Message::ToggleExternalSubs(true), wall);
    step(&mut engine, &clock, 300, wall);
    assert_eq!(renderer.visible().as_deref(), Some("external"));
    assert_eq!(engine.internal_store().len(), 1);
}

#[test]
fn test_empty_external_source_shows_nothing() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(0, 5000, "internal")), wall);
    step(&mut engine, &clock, 100, wall);
    assert_eq!(renderer.visible().as_deref(), Some("internal"));

    engine.dispatch(Message::ToggleExternalSubs(true), wall);
    step(&mut engine, &clock, 200, wall);
    assert!(engine.active_store().is_empty());
    assert_eq!(renderer.visible(), None);
}

#[test]
fn test_flush_replaces_internal_timeline() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(0, 5000, "old")), wall);
    step(&mut engine, &clock, 100, wall);
    assert_eq!(renderer.visible().as_deref(), Some("old"));

    engine.dispatch(Message::Flush(Vec::new()), wall);
    step(&mut engine, &clock, 200, wall);
    assert_eq!(renderer.visible(), None);

    engine.dispatch(Message::Flush(vec![cue(150, 800, "new")]), wall);
    step(&mut engine, &clock, 300, wall);
    assert_eq!(renderer.visible().as_deref(), Some("new"));
}

#[test]
fn test_push_after_cursor_ran_dry() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    step(&mut engine, &clock, 1000, wall);
    assert!(!engine.has_pending());

    engine.dispatch(Message::Push(cue(900, 2000, "late")), wall);
    engine.reconcile(wall);
    assert_eq!(renderer.visible().as_deref(), Some("late"));
}

#[test]
fn test_push_clamps_stop_times() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(0, 3000, "a")), wall);
    engine.dispatch(Message::Push(cue(1000, 2000, "b")), wall);
    let stops: Vec<i64> = engine.internal_store().iter().map(Cue::stop).collect();
    assert_eq!(stops, vec![3000, 3000]);
}

#[test]
fn test_touch_rebuilds_cursor() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(1000, 2000, "cue")), wall);
    step(&mut engine, &clock, 500, wall);
    let unprepares = |r: &RecordingRenderer| {
        r.events()
            .iter()
            .filter(|e| **e == RenderEvent::Unprepare)
            .count()
    };
    let before = unprepares(&renderer);

    step(&mut engine, &clock, 600, wall);
    assert_eq!(unprepares(&renderer), before);

    engine.dispatch(Message::Touch, wall);
    step(&mut engine, &clock, 700, wall);
    assert_eq!(unprepares(&renderer), before + 1);
    assert!(engine.has_pending());
}

#[test]
fn test_clear_keeps_cleared_cue_off_until_next() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(0, 1000, "a")), wall);
    engine.dispatch(Message::Push(cue(1000, 2000, "b")), wall);
    step(&mut engine, &clock, 500, wall);
    assert_eq!(renderer.visible().as_deref(), Some("a"));

    engine.dispatch(Message::Clear, wall);
    assert_eq!(renderer.visible(), None);
    assert!(!engine.is_showing());

    step(&mut engine, &clock, 600, wall);
    assert_eq!(renderer.visible(), None);
    assert_eq!(renderer.prepared_labels().last().map(String::as_str), Some("b"));

    step(&mut engine, &clock, 1000, wall);
    assert_eq!(renderer.visible().as_deref(), Some("b"));
}

#[test]
fn test_prepare_failure_skips_cue() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    renderer.fail_on("bad");
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(cue(0, 1000, "bad glyphs")), wall);
    engine.dispatch(Message::Push(cue(500, 1500, "good")), wall);

    step(&mut engine, &clock, 600, wall);
    assert_eq!(renderer.visible().as_deref(), Some("good"));
    assert_eq!(renderer.prepared_labels(), vec!["good".to_string()]);
}

#[test]
fn test_bitmap_without_canvas_is_dropped() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(Message::Push(image_cue(0, 1000, Rect::new(10, 500, 100, 20))), wall);
    engine.dispatch(Message::Push(cue(500, 1500, "after")), wall);

    step(&mut engine, &clock, 600, wall);
    assert_eq!(renderer.visible().as_deref(), Some("after"));
}

#[test]
fn test_bitmap_geometry_checked_against_canvas() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);
    let wall = Instant::now();

    engine.dispatch(
        Message::DvdSubsInit(DvdLayout::new(
            Dimension::new(720, 576),
            16.0 / 9.0,
            AspectMode::Letterbox,
        )),
        wall,
    );
    assert_eq!(renderer.events(), vec![RenderEvent::DvdInit]);

    engine.dispatch(Message::Push(image_cue(0, 1000, Rect::new(10, 500, 100, 20))), wall);
    engine.dispatch(Message::Push(image_cue(1000, 2000, Rect::new(700, 560, 100, 20))), wall);
    engine.dispatch(Message::Push(cue(2000, 3000, "text")), wall);

    step(&mut engine, &clock, 100, wall);
    assert_eq!(renderer.visible().as_deref(), Some("bitmap 100x20+10+500"));

    // The second bitmap overflows the canvas and never reaches the renderer
    step(&mut engine, &clock, 1000, wall);
    assert_eq!(renderer.visible(), None);
    assert_eq!(
        renderer.prepared_labels(),
        vec!["bitmap 100x20+10+500".to_string(), "text".to_string()]
    );

    step(&mut engine, &clock, 2000, wall);
    assert_eq!(renderer.visible().as_deref(), Some("text"));
}

#[test]
fn test_stop_sets_terminal_flag() {
    let clock = fixtures::clock(0);
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&clock, &renderer);

    engine.dispatch(Message::Stop, Instant::now());
    assert!(engine.is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_longest_wait_promptly() {
    let renderer = RecordingRenderer::new();
    let engine = fixtures::engine(&fixtures::clock(0), &renderer);
    let (tx, mut mailbox) = mailbox::channel();

    let task = tokio::spawn(async move {
        let mut engine = engine;
        engine.run(&mut mailbox).await;
        engine
    });

    // Let the engine park in its capped wait
    tokio::time::sleep(ms(10)).await;
    let sent = Instant::now();
    assert!(tx.send(Message::Stop));

    let engine = task.await.unwrap();
    assert!(sent.elapsed() < ms(1000));
    assert!(engine.is_stopped());
    assert_eq!(renderer.events().last(), Some(&RenderEvent::Clear));
}

#[tokio::test(start_paused = true)]
async fn test_run_exits_when_senders_dropped() {
    let renderer = RecordingRenderer::new();
    let mut engine = fixtures::engine(&fixtures::clock(0), &renderer);
    let (tx, mut mailbox) = mailbox::channel();
    drop(tx);

    engine.run(&mut mailbox).await;
    assert!(engine.is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_run_follows_deadlines() {
    let renderer = RecordingRenderer::new();
    let clock: Arc<VirtualClock> = Arc::new(VirtualClock::new());
    let engine = Engine::new(EngineConfig::default(), Box::new(renderer.clone()), clock);
    let (tx, mut mailbox) = mailbox::channel();

    tx.send(Message::Push(cue(100, 300, "a")));
    tx.send(Message::Push(cue(500, 700, "b")));

    let task = tokio::spawn(async move {
        let mut engine = engine;
        engine.run(&mut mailbox).await;
    });

    tokio::time::sleep(ms(200)).await;
    assert_eq!(renderer.visible().as_deref(), Some("a"));

    tokio::time::sleep(ms(200)).await;
    assert_eq!(renderer.visible(), None);

    tokio::time::sleep(ms(200)).await;
    assert_eq!(renderer.visible().as_deref(), Some("b"));

    tokio::time::sleep(ms(400)).await;
    assert_eq!(renderer.visible(), None);
    assert_eq!(renderer.shows(), 2);

    tx.send(Message::Stop);
    task.await.unwrap();
}

#[test]
fn test_spawned_engine_stops_and_joins() {
    let renderer = RecordingRenderer::new();
    let clock = fixtures::clock(1000);
    let (handle, tx) =
        Engine::spawn(EngineConfig::default(), Box::new(renderer.clone()), clock).unwrap();

    assert!(tx.send(Message::Push(cue(500, 2000, "hello"))));
    assert!(tx.send(Message::Stop));
    handle.join().unwrap();

    assert!(tx.is_closed());
    assert!(renderer.prepared_labels().contains(&"hello".to_string()));
    assert_eq!(renderer.events().last(), Some(&RenderEvent::Clear));
}

#[test]
fn test_spawn_rejects_invalid_config() {
    let config = EngineConfig {
        max_wait_ms: 0,
        ..Default::default()
    };
    let result = Engine::spawn(config, Box::new(RecordingRenderer::new()), fixtures::clock(0));
    assert!(result.is_err());
}

/// Renderer whose flip blows up
struct PanickingRenderer;

impl SubtitleRenderer for PanickingRenderer {
    fn prepare(&mut self, _content: RenderContent<'_>) -> Result<(), RenderError> {
        Ok(())
    }

    fn show_next(&mut self) {
        panic!("display plane lost");
    }

    fn hide(&mut self) {}

    fn clear(&mut self) {}

    fn unprepare(&mut self) {}
}

#[test]
fn test_loop_failure_is_isolated_to_engine_thread() {
    let clock = fixtures::clock(1000);
    let (handle, tx) =
        Engine::spawn(EngineConfig::default(), Box::new(PanickingRenderer), clock).unwrap();

    tx.send(Message::Push(cue(0, 5000, "boom")));
    handle.join().unwrap();

    assert!(tx.is_closed());
    assert!(!tx.send(Message::Touch));
}
