//! Cue model
//!
//! A cue is one timed subtitle event: a start/stop pair in media
//! milliseconds and exactly one payload, either raw text lines (tags still
//! embedded) or a decoded bitmap positioned on the video canvas.

use bytes::Bytes;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Placement of a bitmap on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when the whole rectangle lies inside `canvas`
    pub fn fits_within(&self, canvas: Dimension) -> bool {
        if self.x < 0 || self.y < 0 {
            return false;
        }
        let right = self.x as u64 + self.width as u64;
        let bottom = self.y as u64 + self.height as u64;
        right <= canvas.width as u64 && bottom <= canvas.height as u64
    }
}

/// Decoded bitmap subtitle (e.g. a DVD subpicture)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Row-major pixel data, `rect.height` rows
    pub pixels: Bytes,
    /// Position and size on the video canvas
    pub rect: Rect,
}

impl ImagePayload {
    pub fn new(pixels: impl Into<Bytes>, rect: Rect) -> Self {
        Self {
            pixels: pixels.into(),
            rect,
        }
    }
}

/// Cue payload: text or bitmap, never both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CuePayload {
    /// Raw caption lines, markup not yet parsed
    Text(Vec<String>),
    /// Decoded bitmap
    Image(ImagePayload),
}

/// A single timed subtitle
///
/// Cues are immutable once built. The only adjustment the store performs,
/// stop clamping, consumes the cue and returns a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    start: i64,
    stop: i64,
    payload: CuePayload,
}

impl Cue {
    /// Build a cue; a stop earlier than the start is raised to the start.
    pub fn new(start: i64, stop: i64, payload: CuePayload) -> Self {
        Self {
            start,
            stop: stop.max(start),
            payload,
        }
    }

    /// Text cue from raw lines
    pub fn text<S: Into<String>>(start: i64, stop: i64, lines: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            start,
            stop,
            CuePayload::Text(lines.into_iter().map(Into::into).collect()),
        )
    }

    /// Bitmap cue
    pub fn image(start: i64, stop: i64, image: ImagePayload) -> Self {
        Self::new(start, stop, CuePayload::Image(image))
    }

    /// Start time in milliseconds
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Stop time in milliseconds
    pub fn stop(&self) -> i64 {
        self.stop
    }

    pub fn duration_ms(&self) -> i64 {
        self.stop - self.start
    }

    pub fn payload(&self) -> &CuePayload {
        &self.payload
    }

    pub fn is_image(&self) -> bool {
        matches!(self.payload, CuePayload::Image(_))
    }

    /// Raw text lines, if this is a text cue
    pub fn text_lines(&self) -> Option<&[String]> {
        match &self.payload {
            CuePayload::Text(lines) => Some(lines),
            CuePayload::Image(_) => None,
        }
    }

    /// True while `time` lies in `[start, stop)`
    pub fn is_active_at(&self, time: i64) -> bool {
        self.start <= time && time < self.stop
    }

    /// Same cue with a later stop time. Never shortens the cue.
    pub(crate) fn with_stop_at_least(mut self, stop: i64) -> Self {
        if self.stop < stop {
            self.stop = stop;
        }
        self
    }
}
