//! Configuration file support
//!
//! Loads engine configuration from sectioned TOML files. Every field except
//! the section headers may be omitted and falls back to the default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{EngineConfig, OsdConfig, RendererConfig};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Engine settings
    pub engine: Option<EngineSettings>,
    /// Renderer settings
    pub renderer: Option<RendererSettings>,
    /// OSD settings
    pub osd: Option<OsdSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Deadline cap for one mailbox wait in ms
    pub max_wait_ms: Option<u64>,
    /// Cues buffered per internal stream
    pub buffer_capacity: Option<usize>,
    /// Delay change per step in ms
    pub delay_step_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RendererSettings {
    pub display: Option<u32>,
    pub layer: Option<i32>,
    /// Font size as a fraction of the screen height
    pub font_size: Option<f32>,
    pub centered: Option<bool>,
    pub ghost_box: Option<bool>,
    /// Maximum lines per cue
    pub lines: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsdSettings {
    pub short_ms: Option<u64>,
    pub long_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let defaults = EngineConfig::default();
        Self {
            engine: Some(EngineSettings {
                max_wait_ms: Some(defaults.max_wait_ms),
                buffer_capacity: Some(defaults.buffer_capacity),
                delay_step_ms: Some(defaults.delay_step_ms),
            }),
            renderer: Some(RendererSettings {
                display: Some(defaults.renderer.display),
                layer: Some(defaults.renderer.layer),
                font_size: Some(defaults.renderer.font_size),
                centered: Some(defaults.renderer.centered),
                ghost_box: Some(defaults.renderer.ghost_box),
                lines: Some(defaults.renderer.lines),
            }),
            osd: Some(OsdSettings {
                short_ms: Some(defaults.osd.short_ms),
                long_ms: Some(defaults.osd.long_ms),
            }),
            logging: Some(LoggingSettings {
                level: defaults.log_level,
                format: Some(defaults.log_format),
            }),
        }
    }

    /// Convert to EngineConfig
    pub fn into_engine_config(self) -> EngineConfig {
        let defaults = EngineConfig::default();
        let engine = self.engine.unwrap_or_default();
        let renderer = self.renderer.unwrap_or_default();
        let osd = self.osd.unwrap_or_default();
        let default_renderer = RendererConfig::default();
        let default_osd = OsdConfig::default();

        EngineConfig {
            max_wait_ms: engine.max_wait_ms.unwrap_or(defaults.max_wait_ms),
            buffer_capacity: engine.buffer_capacity.unwrap_or(defaults.buffer_capacity),
            delay_step_ms: engine.delay_step_ms.unwrap_or(defaults.delay_step_ms),
            renderer: RendererConfig {
                display: renderer.display.unwrap_or(default_renderer.display),
                layer: renderer.layer.unwrap_or(default_renderer.layer),
                font_size: renderer.font_size.unwrap_or(default_renderer.font_size),
                centered: renderer.centered.unwrap_or(default_renderer.centered),
                ghost_box: renderer.ghost_box.unwrap_or(default_renderer.ghost_box),
                lines: renderer.lines.unwrap_or(default_renderer.lines),
            },
            osd: OsdConfig {
                short_ms: osd.short_ms.unwrap_or(default_osd.short_ms),
                long_ms: osd.long_ms.unwrap_or(default_osd.long_ms),
            },
            log_level: self
                .logging
                .as_ref()
                .map(|l| l.level.clone())
                .unwrap_or(defaults.log_level),
            log_format: self
                .logging
                .and_then(|l| l.format)
                .unwrap_or(defaults.log_format),
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
