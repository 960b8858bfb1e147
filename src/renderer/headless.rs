//! Headless renderer
//!
//! Keeps the prepared/visible surface pair in memory and reports every
//! visibility change through `tracing`. Used when no display plane is
//! available and by the demo binary.

use crate::config::RendererConfig;
use crate::error::RenderError;
use crate::subtitle::cue::Rect;
use crate::subtitle::tags::line_text;

use super::{DvdLayout, RenderContent, SubtitleRenderer};

/// A laid-out surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Surface {
    /// Plain text of the drawn lines, at most `lines` of them
    Text(Vec<String>),
    /// Bitmap placement on the video canvas
    Bitmap(Rect),
}

/// Renderer that draws nothing and logs instead
#[derive(Debug)]
pub struct HeadlessRenderer {
    config: RendererConfig,
    max_lines: usize,
    dvd: Option<DvdLayout>,
    prepared: Option<Surface>,
    visible: Option<Surface>,
}

impl HeadlessRenderer {
    pub fn new(config: &RendererConfig) -> Self {
        tracing::debug!(
            "Headless subtitle renderer: display={} layer={} font_size={} centered={} ghost_box={} lines={}",
            config.display,
            config.layer,
            config.font_size,
            config.centered,
            config.ghost_box,
            config.lines
        );
        Self {
            config: config.clone(),
            max_lines: config.lines.max(1) as usize,
            dvd: None,
            prepared: None,
            visible: None,
        }
    }

    /// Layout settings this renderer was built with
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Surface currently on screen
    pub fn visible(&self) -> Option<&Surface> {
        self.visible.as_ref()
    }

    /// Surface waiting for `show_next`
    pub fn prepared(&self) -> Option<&Surface> {
        self.prepared.as_ref()
    }
}

impl SubtitleRenderer for HeadlessRenderer {
    fn prepare(&mut self, content: RenderContent<'_>) -> Result<(), RenderError> {
        let surface = match content {
            RenderContent::Text(lines) => {
                if lines.is_empty() {
                    return Err(RenderError::Layout("no lines to draw".to_string()));
                }
                // The bottom-most lines win when a cue has more than fit.
                let skip = lines.len().saturating_sub(self.max_lines);
                Surface::Text(lines[skip..].iter().map(|l| line_text(l)).collect())
            }
            RenderContent::Image(image) => {
                let layout = self.dvd.as_ref().ok_or(RenderError::NoCanvas)?;
                layout.check(image)?;
                Surface::Bitmap(image.rect)
            }
        };
        self.prepared = Some(surface);
        Ok(())
    }

    fn show_next(&mut self) {
        if let Some(surface) = self.prepared.take() {
            match &surface {
                Surface::Text(lines) => tracing::info!("Subtitle: {}", lines.join(" | ")),
                Surface::Bitmap(rect) => tracing::info!("Subtitle bitmap at {:?}", rect),
            }
            self.visible = Some(surface);
        }
    }

    fn hide(&mut self) {
        if self.visible.take().is_some() {
            tracing::info!("Subtitle hidden");
        }
        self.prepared = None;
    }

    fn clear(&mut self) {
        self.prepared = None;
        self.visible = None;
    }

    fn unprepare(&mut self) {
        self.prepared = None;
    }

    fn init_dvd_subs(&mut self, layout: &DvdLayout) {
        tracing::debug!(
            "DVD subtitles: {}x{} aspect={:.3} mode={:?}",
            layout.video.width,
            layout.video.height,
            layout.aspect,
            layout.mode
        );
        self.dvd = Some(*layout);
    }
}
