//! Renderer sink
//!
//! The engine drives a renderer through a two-phase protocol: `prepare`
//! lays out the next subtitle off screen, `show_next` flips it visible at
//! the display deadline. Only the engine thread ever calls a renderer.

pub mod headless;

use std::str::FromStr;

use crate::error::RenderError;
use crate::subtitle::cue::{Dimension, ImagePayload};
use crate::subtitle::tags::StyledLine;

pub use self::headless::HeadlessRenderer;

/// What gets laid out by [`SubtitleRenderer::prepare`]
#[derive(Debug, Clone, Copy)]
pub enum RenderContent<'a> {
    /// Styled text, one entry per line, top to bottom
    Text(&'a [StyledLine]),
    /// Bitmap already validated against the DVD canvas
    Image(&'a ImagePayload),
}

/// How DVD subpictures are scaled onto the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectMode {
    #[default]
    Default,
    Letterbox,
    Fill,
    Stretch,
}

impl FromStr for AspectMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(AspectMode::Default),
            "letterbox" => Ok(AspectMode::Letterbox),
            "fill" => Ok(AspectMode::Fill),
            "stretch" => Ok(AspectMode::Stretch),
            other => Err(format!("unknown aspect mode: {}", other)),
        }
    }
}

/// Geometry of the video DVD subpictures are drawn over
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DvdLayout {
    /// Video frame size; bitmap rects must fit inside it
    pub video: Dimension,
    /// Display aspect ratio of the video
    pub aspect: f32,
    pub mode: AspectMode,
}

impl DvdLayout {
    pub fn new(video: Dimension, aspect: f32, mode: AspectMode) -> Self {
        Self {
            video,
            aspect,
            mode,
        }
    }

    /// Reject bitmaps that would spill outside the video frame
    pub fn check(&self, image: &ImagePayload) -> Result<(), RenderError> {
        if image.rect.fits_within(self.video) {
            Ok(())
        } else {
            Err(RenderError::BitmapOutOfBounds {
                rect: image.rect,
                canvas: self.video,
            })
        }
    }
}

/// Display surface driven by the timing engine
pub trait SubtitleRenderer: Send {
    /// Lay out `content` on the off-screen surface. Must not become visible.
    fn prepare(&mut self, content: RenderContent<'_>) -> Result<(), RenderError>;

    /// Make the most recently prepared surface visible, replacing the
    /// visible one.
    fn show_next(&mut self);

    /// Make nothing visible
    fn hide(&mut self);

    /// Drop every retained surface, visible or prepared
    fn clear(&mut self);

    /// Release a prepared surface that was never shown
    fn unprepare(&mut self);

    /// Configure bitmap subtitle scaling
    fn init_dvd_subs(&mut self, _layout: &DvdLayout) {}
}

impl<R: SubtitleRenderer + ?Sized> SubtitleRenderer for Box<R> {
    fn prepare(&mut self, content: RenderContent<'_>) -> Result<(), RenderError> {
        (**self).prepare(content)
    }

    fn show_next(&mut self) {
        (**self).show_next()
    }

    fn hide(&mut self) {
        (**self).hide()
    }

    fn clear(&mut self) {
        (**self).clear()
    }

    fn unprepare(&mut self) {
        (**self).unprepare()
    }

    fn init_dvd_subs(&mut self, layout: &DvdLayout) {
        (**self).init_dvd_subs(layout)
    }
}
