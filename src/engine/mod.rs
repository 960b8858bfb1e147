//! Subtitle timing engine
//!
//! A single-threaded loop that owns the cue timelines, the cursor into the
//! active one and the renderer. Each iteration waits on the mailbox for at
//! most the time until the next deadline (current cue stop, next cue start,
//! OSD expiry, capped at `max_wait_ms`), applies at most one message, then
//! reconciles what is on screen with the clock.
//!
//! Preparation runs one cue ahead of its start so that the flip at the
//! deadline is a single `show_next` call.

pub mod clock;
pub mod mailbox;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::error::{RenderError, Result, SubtitleError};
use crate::renderer::{DvdLayout, RenderContent, SubtitleRenderer};
use crate::subtitle::cue::{Cue, CuePayload};
use crate::subtitle::store::CueStore;
use crate::subtitle::tags;

use self::clock::PlaybackClock;
use self::mailbox::{Mailbox, MailboxSender, Message, Received};

/// Previous-time value that makes the next pass rebuild the cursor
const FORCE_RESET: i64 = i64::MAX;

/// `current_stop` while nothing is scheduled to end
const NO_STOP: i64 = i64::MIN;

/// Which timeline drives the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Internal,
    External,
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    /// Position in the active timeline of the next cue to show
    next_index: usize,
    /// The cue at `next_index` is prepared on the renderer
    have_next: bool,
    /// Stop time of the visible cue
    current_stop: i64,
    showing: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            next_index: 0,
            have_next: false,
            current_stop: NO_STOP,
            showing: false,
        }
    }
}

/// Timing engine state
pub struct Engine {
    config: EngineConfig,
    renderer: Box<dyn SubtitleRenderer>,
    clock: Arc<dyn PlaybackClock>,
    internal: CueStore,
    external: CueStore,
    source: Source,
    cursor: Cursor,
    prev_now: i64,
    paused: bool,
    delay: i64,
    osd_until: Option<Instant>,
    dvd: Option<DvdLayout>,
    stopped: bool,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        renderer: Box<dyn SubtitleRenderer>,
        clock: Arc<dyn PlaybackClock>,
    ) -> Self {
        Self {
            config,
            renderer,
            clock,
            internal: CueStore::new(),
            external: CueStore::new(),
            source: Source::Internal,
            cursor: Cursor::default(),
            prev_now: FORCE_RESET,
            paused: false,
            delay: 0,
            osd_until: None,
            dvd: None,
            stopped: false,
        }
    }

    /// Start the engine on its own thread.
    ///
    /// The returned sender is the only way to reach the engine; dropping
    /// every clone of it stops the loop just like [`Message::Stop`].
    pub fn spawn(
        config: EngineConfig,
        renderer: Box<dyn SubtitleRenderer>,
        clock: Arc<dyn PlaybackClock>,
    ) -> Result<(EngineHandle, MailboxSender)> {
        let config = config.validate()?;
        let (sender, mut mailbox) = mailbox::channel();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let engine = Engine::new(config, renderer, clock);

        let thread = std::thread::Builder::new()
            .name("subtitle-engine".to_string())
            .spawn(move || {
                // A panic in the loop surfaces as a JoinError instead of
                // unwinding through the thread.
                let task = runtime.spawn(async move {
                    let mut engine = engine;
                    engine.run(&mut mailbox).await;
                });
                if let Err(e) = runtime.block_on(task) {
                    tracing::error!("Subtitle engine loop failed: {}", e);
                }
                flag.store(false, Ordering::SeqCst);
            })?;

        Ok((
            EngineHandle {
                thread: Some(thread),
                running,
            },
            sender,
        ))
    }

    /// Run until `Stop` is received or every sender is dropped
    pub async fn run(&mut self, mailbox: &mut Mailbox) {
        tracing::info!("Subtitle engine started");

        loop {
            let timeout = self.next_timeout(Instant::now());

            match mailbox.receive_timeout(timeout).await {
                Received::Message(message) => self.dispatch(message, Instant::now()),
                Received::Timeout => {}
                Received::Closed => {
                    tracing::info!("Subtitle mailbox closed");
                    self.stopped = true;
                }
            }

            if self.stopped {
                break;
            }

            self.reconcile(Instant::now());
        }

        self.renderer.clear();
        tracing::info!("Subtitle engine stopped");
    }

    /// How long the next mailbox wait may last.
    ///
    /// While an OSD message is up only its expiry counts; cue deadlines are
    /// suspended until it is gone. A deadline already in the past yields
    /// zero.
    pub fn next_timeout(&self, wall: Instant) -> Duration {
        let mut timeout = self.config.max_wait_ms.min(i64::MAX as u64) as i64;

        if let Some(until) = self.osd_until {
            // Round up so the wake-up lands at or after the expiry instant.
            let left = until.saturating_duration_since(wall) + Duration::from_nanos(999_999);
            timeout = timeout.min(left.as_millis().min(i64::MAX as u128) as i64);
        } else if !self.paused {
            let now = self.now();
            if self.cursor.showing && self.cursor.current_stop != NO_STOP {
                timeout = timeout.min(self.cursor.current_stop.saturating_sub(now));
            }
            if let Some(next) = self.pending() {
                // A pending cue cannot replace the visible one before it stops.
                let due = next.start().max(self.cursor.current_stop);
                timeout = timeout.min(due.saturating_sub(now));
            }
        }

        Duration::from_millis(timeout.max(0) as u64)
    }

    /// Apply one mailbox message
    pub fn dispatch(&mut self, message: Message, wall: Instant) {
        tracing::trace!("Subtitle engine received {}", message.kind());

        match message {
            Message::DvdSubsInit(layout) => {
                self.renderer.init_dvd_subs(&layout);
                self.dvd = Some(layout);
            }
            Message::Push(cue) => {
                self.internal.append(cue);
            }
            Message::SendExternalSubs(cues) => {
                self.external.replace_all(cues);
                self.source = Source::External;
                self.force_reset();
            }
            Message::ToggleExternalSubs(enable) => {
                self.source = if enable {
                    Source::External
                } else {
                    Source::Internal
                };
                self.force_reset();
            }
            Message::Flush(cues) => {
                self.internal.replace_all(cues);
                self.source = Source::Internal;
                self.force_reset();
            }
            Message::Touch => self.force_reset(),
            Message::SetPaused(paused) => self.paused = paused,
            Message::SetDelay(delay) => {
                self.delay = delay;
                self.force_reset();
            }
            Message::Stop => self.stopped = true,
            Message::DisplayText { lines, duration_ms } => {
                self.display_text(&lines, duration_ms, wall)
            }
            Message::Clear => {
                // The cleared cue stays off until its stop; the pending
                // surface went with it and is prepared again next pass.
                self.renderer.clear();
                self.cursor.showing = false;
                self.cursor.have_next = false;
            }
        }
    }

    /// Bring the renderer in line with the clock
    pub fn reconcile(&mut self, wall: Instant) {
        let now = self.now();

        let overshot = self.pending().map_or(false, |next| next.stop() <= now);
        if now < self.prev_now || overshot {
            self.reset(now);
        } else if !self.cursor.have_next {
            self.try_prepare(now);
        }

        self.prev_now = now;

        if self.osd_until.is_some_and(|until| wall >= until) {
            self.osd_until = None;
        }

        if self.osd_until.is_some() || self.cursor.current_stop > now {
            return;
        }

        match self.pending().map(|next| (next.start(), next.stop())) {
            Some((start, stop)) if start <= now => {
                self.renderer.show_next();
                tracing::debug!(
                    "Showing cue {} [{}, {}) at {} ms ({} ms late)",
                    self.cursor.next_index,
                    start,
                    stop,
                    now,
                    now - start
                );
                self.cursor.showing = true;
                self.cursor.current_stop = stop;
                self.cursor.next_index += 1;
                self.cursor.have_next = false;
                self.try_prepare(now);
            }
            _ if self.cursor.showing => {
                self.renderer.hide();
                tracing::debug!("Hiding subtitle at {} ms", now);
                self.cursor.showing = false;
            }
            _ => {}
        }
    }

    /// Media time adjusted by the subtitle delay
    pub fn now(&self) -> i64 {
        self.clock.media_time_ms().saturating_sub(self.delay)
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn active_store(&self) -> &CueStore {
        match self.source {
            Source::Internal => &self.internal,
            Source::External => &self.external,
        }
    }

    pub fn internal_store(&self) -> &CueStore {
        &self.internal
    }

    pub fn external_store(&self) -> &CueStore {
        &self.external
    }

    pub fn is_showing(&self) -> bool {
        self.cursor.showing
    }

    pub fn has_pending(&self) -> bool {
        self.cursor.have_next
    }

    pub fn next_index(&self) -> usize {
        self.cursor.next_index
    }

    /// Stop time of the visible cue, if one is scheduled to end
    pub fn current_stop(&self) -> Option<i64> {
        (self.cursor.current_stop != NO_STOP).then_some(self.cursor.current_stop)
    }

    pub fn is_osd_active(&self) -> bool {
        self.osd_until.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn delay(&self) -> i64 {
        self.delay
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Cue prepared for the next flip
    fn pending(&self) -> Option<&Cue> {
        if self.cursor.have_next {
            self.active_store().get(self.cursor.next_index)
        } else {
            None
        }
    }

    fn force_reset(&mut self) {
        self.prev_now = FORCE_RESET;
    }

    /// Rebuild the cursor from scratch with a binary search
    fn reset(&mut self, now: i64) {
        self.renderer.unprepare();
        self.cursor.current_stop = NO_STOP;
        self.cursor.have_next = false;
        self.cursor.next_index = self.active_store().find_first_covering_or_after(now);
        tracing::trace!("Cursor reset to {} at {} ms", self.cursor.next_index, now);
        self.try_prepare(now);
    }

    /// Prepare the first cue from the cursor on that has not ended yet.
    /// Cues the renderer cannot prepare are skipped.
    fn try_prepare(&mut self, now: i64) {
        let store = match self.source {
            Source::Internal => &self.internal,
            Source::External => &self.external,
        };

        while self.cursor.next_index < store.len() {
            let cue = &store[self.cursor.next_index];
            if cue.stop() > now {
                match prepare_cue(self.renderer.as_mut(), self.dvd.as_ref(), cue) {
                    Ok(()) => {
                        self.cursor.have_next = true;
                        return;
                    }
                    Err(e) => tracing::warn!(
                        "Skipping cue {} [{}, {}): {}",
                        self.cursor.next_index,
                        cue.start(),
                        cue.stop(),
                        e
                    ),
                }
            }
            self.cursor.next_index += 1;
        }
    }

    fn display_text(&mut self, lines: &[String], duration_ms: u64, wall: Instant) {
        let styled = tags::parse_lines(lines);
        match self.renderer.prepare(RenderContent::Text(&styled)) {
            Ok(()) => {
                self.renderer.show_next();
                self.cursor.showing = true;
                self.osd_until = Some(wall + Duration::from_millis(duration_ms));
            }
            Err(e) => tracing::warn!("Failed to prepare on-screen message: {}", e),
        }
        self.force_reset();
    }
}

/// Lay out one cue on the renderer
fn prepare_cue(
    renderer: &mut dyn SubtitleRenderer,
    dvd: Option<&DvdLayout>,
    cue: &Cue,
) -> std::result::Result<(), RenderError> {
    match cue.payload() {
        CuePayload::Text(lines) => {
            let styled = tags::parse_lines(lines);
            renderer.prepare(RenderContent::Text(&styled))
        }
        CuePayload::Image(image) => {
            let layout = dvd.ok_or(RenderError::NoCanvas)?;
            layout.check(image)?;
            renderer.prepare(RenderContent::Image(image))
        }
    }
}

/// Handle to the engine thread
#[derive(Debug)]
pub struct EngineHandle {
    thread: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl EngineHandle {
    /// False once the loop has exited, normally or not
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait for the engine thread to finish
    pub fn join(mut self) -> Result<()> {
        self.join_thread()
    }

    pub(crate) fn join_thread(&mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| SubtitleError::Runtime("subtitle engine thread panicked".to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_starts_empty() {
        let cursor = Cursor::default();
        assert_eq!(cursor.current_stop, NO_STOP);
        assert!(!cursor.have_next && !cursor.showing);
    }
}
