//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, SubtitleError};

/// Renderer layout configuration.
///
/// `display`, `layer`, `font_size`, `centered` and `ghost_box` place and
/// style the subtitle plane of a hardware renderer. The headless renderer
/// only honours `lines` and logs the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Display number the subtitle layer is placed on
    pub display: u32,

    /// Layer index of the subtitle plane
    pub layer: i32,

    /// Font size as a fraction of the screen height
    pub font_size: f32,

    /// Center lines horizontally instead of left-aligning them
    pub centered: bool,

    /// Draw a translucent box behind each line
    pub ghost_box: bool,

    /// Maximum number of lines drawn per cue
    pub lines: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            display: 0,
            layer: 3,
            font_size: 0.055,
            centered: false,
            ghost_box: true,
            lines: 3,
        }
    }
}

/// On-screen message durations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsdConfig {
    /// Duration of short messages (stream switches, delay changes) in ms
    pub short_ms: u64,

    /// Duration of long messages in ms
    pub long_ms: u64,
}

impl Default for OsdConfig {
    fn default() -> Self {
        Self {
            short_ms: 1000,
            long_ms: 2000,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for a single mailbox wait in milliseconds
    pub max_wait_ms: u64,

    /// Cues buffered per internal stream on the producer side
    pub buffer_capacity: usize,

    /// Subtitle delay change per key press in milliseconds
    pub delay_step_ms: i64,

    /// Renderer configuration
    pub renderer: RendererConfig,

    /// OSD configuration
    pub osd: OsdConfig,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: 1000,
            buffer_capacity: 32,
            delay_step_ms: 250,
            renderer: RendererConfig::default(),
            osd: OsdConfig::default(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl EngineConfig {
    /// Check limits, raising the line count to at least one
    pub fn validate(mut self) -> Result<Self> {
        if self.max_wait_ms == 0 {
            return Err(SubtitleError::Config(
                "max_wait_ms must be greater than zero".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(SubtitleError::Config(
                "buffer_capacity must be greater than zero".to_string(),
            ));
        }
        self.renderer.lines = self.renderer.lines.max(1);
        Ok(self)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &str) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
