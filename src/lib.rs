pub mod config;
pub mod config_file;
pub mod controller;
pub mod engine;
pub mod error;
pub mod renderer;
pub mod subtitle;

#[cfg(test)]
pub(crate) mod tests;

pub use config::{EngineConfig, OsdConfig, RendererConfig};
pub use controller::SubtitleController;
pub use engine::clock::{ManualClock, PlaybackClock, WallClock};
pub use engine::mailbox::{Mailbox, MailboxSender, Message};
pub use engine::{Engine, EngineHandle, Source};
pub use error::{RenderError, Result, SubtitleError};
pub use renderer::{AspectMode, DvdLayout, HeadlessRenderer, RenderContent, SubtitleRenderer};
pub use subtitle::cue::{Cue, CuePayload, Dimension, ImagePayload, Rect};
pub use subtitle::packet::{SubtitleCodec, SubtitlePacket};
pub use subtitle::store::CueStore;
pub use subtitle::tags::{parse_lines, StyledLine, StyledRun};
