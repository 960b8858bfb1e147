use thiserror::Error;

use crate::subtitle::cue::{Dimension, Rect};

/// Main error type for the subtitle engine
#[derive(Error, Debug)]
pub enum SubtitleError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Invalid subtitle stream: index={index}, count={count}")]
    InvalidStream { index: usize, count: usize },
}

/// Renderer-specific errors
///
/// These never leave the engine thread; a failed `prepare` only costs the
/// cue it was called for.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to lay out text: {0}")]
    Layout(String),

    #[error("Bitmap {rect:?} does not fit the {canvas:?} canvas")]
    BitmapOutOfBounds { rect: Rect, canvas: Dimension },

    #[error("No canvas configured for bitmap subtitles")]
    NoCanvas,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SubtitleError>;
