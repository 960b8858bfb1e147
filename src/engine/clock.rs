//! Playback clocks
//!
//! The engine reads media time in milliseconds from a [`PlaybackClock`].
//! Time is expected to move forward; any decrease is taken as a seek.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Source of the current media time
pub trait PlaybackClock: Send + Sync {
    /// Current media time in milliseconds
    fn media_time_ms(&self) -> i64;
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl PlaybackClock for ManualClock {
    fn media_time_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct WallState {
    anchor: Instant,
    base_ms: i64,
    paused_at: Option<i64>,
}

/// Media clock running at wall-clock speed, with pause and seek
#[derive(Debug)]
pub struct WallClock {
    state: Mutex<WallState>,
}

impl WallClock {
    /// Start running from `start_ms`
    pub fn new(start_ms: i64) -> Self {
        Self {
            state: Mutex::new(WallState {
                anchor: Instant::now(),
                base_ms: start_ms,
                paused_at: None,
            }),
        }
    }

    pub fn pause(&self) {
        let mut state = self.state.lock();
        if state.paused_at.is_none() {
            let now = state.base_ms + state.anchor.elapsed().as_millis() as i64;
            state.paused_at = Some(now);
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.lock();
        if let Some(at) = state.paused_at.take() {
            state.base_ms = at;
            state.anchor = Instant::now();
        }
    }

    pub fn seek(&self, to_ms: i64) {
        let mut state = self.state.lock();
        state.base_ms = to_ms;
        state.anchor = Instant::now();
        if state.paused_at.is_some() {
            state.paused_at = Some(to_ms);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused_at.is_some()
    }
}

impl PlaybackClock for WallClock {
    fn media_time_ms(&self) -> i64 {
        let state = self.state.lock();
        match state.paused_at {
            Some(at) => at,
            None => state.base_ms + state.anchor.elapsed().as_millis() as i64,
        }
    }
}
