//! Subtitle controller
//!
//! Producer-side facade used by the player. It buffers the most recent cues
//! of every internal subtitle stream, tracks which source is selected and
//! whether subtitles are visible, and turns those decisions into mailbox
//! messages for the engine. Safe to share between the demuxer thread and
//! the control thread.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::clock::PlaybackClock;
use crate::engine::mailbox::{MailboxSender, Message};
use crate::engine::{Engine, EngineHandle};
use crate::error::{Result, SubtitleError};
use crate::renderer::{AspectMode, DvdLayout, SubtitleRenderer};
use crate::subtitle::cue::{Cue, Dimension};
use crate::subtitle::packet::SubtitlePacket;
use crate::subtitle::store::CueStore;

#[derive(Debug)]
struct ControllerState {
    /// Recent cues per internal stream
    buffers: Vec<CueStore>,
    visible: bool,
    use_external: bool,
    has_external: bool,
    active_index: usize,
    delay: i64,
}

/// Owns the engine thread and feeds it
pub struct SubtitleController {
    config: EngineConfig,
    sender: MailboxSender,
    handle: Option<EngineHandle>,
    state: Mutex<ControllerState>,
}

impl SubtitleController {
    /// Validate `config` and start the engine thread
    pub fn new(
        config: EngineConfig,
        renderer: Box<dyn SubtitleRenderer>,
        clock: Arc<dyn PlaybackClock>,
    ) -> Result<Self> {
        let config = config.validate()?;
        let (handle, sender) = Engine::spawn(config.clone(), renderer, clock)?;

        Ok(Self {
            config,
            sender,
            handle: Some(handle),
            state: Mutex::new(ControllerState {
                buffers: Vec::new(),
                visible: true,
                use_external: false,
                has_external: false,
                active_index: 0,
                delay: 0,
            }),
        })
    }

    /// Prepare `stream_count` internal stream buffers and load an external
    /// subtitle file, if one was given. A non-empty external track becomes
    /// the active source.
    pub fn open(&self, stream_count: usize, external: Vec<Cue>) {
        let mut state = self.state.lock();
        state.buffers = (0..stream_count)
            .map(|_| CueStore::bounded(self.config.buffer_capacity))
            .collect();
        state.active_index = 0;

        if !external.is_empty() {
            tracing::info!("Loaded {} external subtitle cues", external.len());
            self.send(Message::SendExternalSubs(external));
            state.use_external = true;
            state.has_external = true;
        }
    }

    /// Configure the canvas for DVD subpictures
    pub fn init_dvd_subs(&self, video: Dimension, aspect: f32, mode: AspectMode) {
        self.send(Message::DvdSubsInit(DvdLayout::new(video, aspect, mode)));
    }

    /// Buffer a demuxed subtitle packet and forward it if it belongs to the
    /// stream on screen.
    ///
    /// Packets of codecs the engine cannot show are accepted and ignored.
    /// Returns `Ok(false)` when the packet carries nothing displayable.
    pub fn add_packet(&self, packet: &SubtitlePacket, stream_index: usize) -> Result<bool> {
        let mut state = self.state.lock();
        let count = state.buffers.len();
        if stream_index >= count {
            return Err(SubtitleError::InvalidStream {
                index: stream_index,
                count,
            });
        }

        if !packet.codec.is_supported() {
            return Ok(true);
        }

        let Some(cue) = packet.to_cue() else {
            tracing::debug!(
                "Dropping empty {} packet at {} ms",
                packet.codec.name(),
                packet.start_ms()
            );
            return Ok(false);
        };

        let buffer = &mut state.buffers[stream_index];
        buffer.append(cue);
        let stored = buffer.last().cloned();

        if !state.use_external && state.visible && stream_index == state.active_index {
            if let Some(cue) = stored {
                self.send(Message::Push(cue));
            }
        }

        Ok(true)
    }

    /// Drop buffered cues after a seek
    pub fn flush(&self) {
        let mut state = self.state.lock();
        for buffer in state.buffers.iter_mut() {
            buffer.clear();
        }

        if state.visible {
            if state.use_external {
                self.send(Message::Touch);
            } else {
                self.send(Message::Flush(Vec::new()));
            }
        }
    }

    pub fn pause(&self) {
        self.send(Message::SetPaused(true));
    }

    pub fn resume(&self) {
        self.send(Message::SetPaused(false));
    }

    /// Set the subtitle delay in ms. Positive values show subtitles later.
    pub fn set_delay(&self, delay_ms: i64) {
        self.state.lock().delay = delay_ms;
        self.send(Message::SetDelay(delay_ms));
    }

    pub fn delay(&self) -> i64 {
        self.state.lock().delay
    }

    /// Move the delay by `steps` configured steps and show the result.
    ///
    /// Ignored while subtitles are hidden; returns the delay in effect.
    pub fn adjust_delay(&self, steps: i64) -> i64 {
        let delay = {
            let mut state = self.state.lock();
            if !state.visible {
                return state.delay;
            }
            state.delay += steps * self.config.delay_step_ms;
            state.delay
        };
        self.send(Message::SetDelay(delay));
        self.display_text_short(&format!("Subtitle delay: {} ms", delay));
        delay
    }

    /// Show or hide subtitles
    pub fn set_visible(&self, visible: bool) {
        let mut state = self.state.lock();
        if visible == state.visible {
            return;
        }
        state.visible = visible;

        if visible {
            self.flush_renderer(&state);
        } else if state.use_external {
            self.send(Message::ToggleExternalSubs(false));
        } else {
            self.send(Message::Flush(Vec::new()));
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state.lock().visible
    }

    /// Select the internal stream to display
    pub fn set_active_stream(&self, index: usize) -> Result<()> {
        let mut state = self.state.lock();
        let count = state.buffers.len();
        if index >= count {
            return Err(SubtitleError::InvalidStream { index, count });
        }

        state.active_index = index;
        if !state.use_external && state.visible {
            self.flush_renderer(&state);
        }
        Ok(())
    }

    pub fn active_stream(&self) -> usize {
        self.state.lock().active_index
    }

    pub fn stream_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Switch between the external track and the internal streams
    pub fn set_use_external(&self, use_external: bool) {
        let mut state = self.state.lock();
        state.use_external = use_external;
        if state.visible {
            self.flush_renderer(&state);
        }
    }

    pub fn use_external(&self) -> bool {
        self.state.lock().use_external
    }

    /// Cycle forward: external track, stream 1, stream 2, ...
    ///
    /// Wraps from the last stream to stream 1; the external track is only
    /// reached going backward. Always makes subtitles visible.
    pub fn next_stream(&self) {
        let message = {
            let mut state = self.state.lock();
            let mut message = None;

            if state.use_external {
                if !state.buffers.is_empty() {
                    state.use_external = false;
                    state.active_index = 0;
                    message = Some("Subtitle stream: 1".to_string());
                    if state.visible {
                        self.flush_renderer(&state);
                    }
                }
            } else if !state.buffers.is_empty() {
                state.active_index = (state.active_index + 1) % state.buffers.len();
                message = Some(format!("Subtitle stream: {}", state.active_index + 1));
                if state.visible {
                    self.flush_renderer(&state);
                }
            }
            message
        };

        if let Some(text) = message {
            self.display_text_short(&text);
        }
        self.set_visible(true);
    }

    /// Cycle backward; stepping back from stream 1 selects the external
    /// track if one was loaded.
    pub fn previous_stream(&self) {
        let message = {
            let mut state = self.state.lock();
            let mut message = None;

            if !state.use_external {
                if state.active_index == 0 {
                    if state.has_external {
                        state.use_external = true;
                        message = Some("Subtitle file".to_string());
                        if state.visible {
                            self.flush_renderer(&state);
                        }
                    }
                } else {
                    state.active_index -= 1;
                    message = Some(format!("Subtitle stream: {}", state.active_index + 1));
                    if state.visible {
                        self.flush_renderer(&state);
                    }
                }
            }
            message
        };

        if let Some(text) = message {
            self.display_text_short(&text);
        }
        self.set_visible(true);
    }

    /// Flash a message on screen for `duration_ms`. One line per `'\n'`.
    pub fn display_text(&self, text: &str, duration_ms: u64) {
        let lines = text.split('\n').map(str::to_string).collect();
        self.send(Message::DisplayText { lines, duration_ms });
    }

    pub fn display_text_short(&self, text: &str) {
        self.display_text(text, self.config.osd.short_ms);
    }

    pub fn display_text_long(&self, text: &str) {
        self.display_text(text, self.config.osd.long_ms);
    }

    /// Remove whatever the renderer holds
    pub fn clear(&self) {
        self.send(Message::Clear);
    }

    /// Release the stream buffers. The engine keeps running.
    pub fn close(&self) {
        self.state.lock().buffers.clear();
    }

    /// Stop the engine and wait for its thread
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(mut handle) = self.handle.take() else {
            return Ok(());
        };

        if handle.is_running() {
            self.sender.send(Message::Stop);
        }
        handle.join_thread()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, EngineHandle::is_running)
    }

    /// Re-send the selected source to the engine
    fn flush_renderer(&self, state: &ControllerState) {
        if state.use_external {
            self.send(Message::ToggleExternalSubs(true));
        } else {
            let cues = state
                .buffers
                .get(state.active_index)
                .map(CueStore::to_vec)
                .unwrap_or_default();
            self.send(Message::Flush(cues));
        }
    }

    fn send(&self, message: Message) {
        if !self.sender.send(message) {
            tracing::warn!("Subtitle engine is not running");
        }
    }
}

impl Drop for SubtitleController {
    fn drop(&mut self) {
        self.close();
        if let Err(e) = self.shutdown() {
            tracing::error!("Failed to stop subtitle engine: {}", e);
        }
    }
}
