//! Command mailbox
//!
//! Producers (demuxer, control thread) talk to the engine exclusively
//! through typed messages. Sending never blocks; the engine consumes one
//! message per wait and applies it atomically with respect to the loop.

use std::time::Duration;
use tokio::sync::mpsc;

use crate::renderer::DvdLayout;
use crate::subtitle::cue::Cue;

/// Control message for the timing engine
#[derive(Debug)]
pub enum Message {
    /// Append one internal cue discovered by the demuxer
    Push(Cue),
    /// Replace the internal timeline and make it active
    Flush(Vec<Cue>),
    /// Replace the external timeline and make it active
    SendExternalSubs(Vec<Cue>),
    /// Select the external (true) or internal (false) timeline
    ToggleExternalSubs(bool),
    /// Force the cursor to be rebuilt against the current clock
    Touch,
    SetPaused(bool),
    /// Subtitle delay in ms, subtracted from clock reads
    SetDelay(i64),
    /// Terminate the engine loop
    Stop,
    /// Flash an on-screen message, overriding cues for `duration_ms`
    DisplayText { lines: Vec<String>, duration_ms: u64 },
    /// Drop all renderer surfaces
    Clear,
    /// Configure bitmap subtitle geometry
    DvdSubsInit(DvdLayout),
}

impl Message {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Push(_) => "Push",
            Message::Flush(_) => "Flush",
            Message::SendExternalSubs(_) => "SendExternalSubs",
            Message::ToggleExternalSubs(_) => "ToggleExternalSubs",
            Message::Touch => "Touch",
            Message::SetPaused(_) => "SetPaused",
            Message::SetDelay(_) => "SetDelay",
            Message::Stop => "Stop",
            Message::DisplayText { .. } => "DisplayText",
            Message::Clear => "Clear",
            Message::DvdSubsInit(_) => "DvdSubsInit",
        }
    }
}

/// Outcome of one mailbox wait
#[derive(Debug)]
pub enum Received {
    Message(Message),
    /// The wait elapsed without a message
    Timeout,
    /// Every sender is gone
    Closed,
}

/// Producer side of the mailbox. Cheap to clone, one per producer thread.
#[derive(Debug, Clone)]
pub struct MailboxSender {
    tx: mpsc::UnboundedSender<Message>,
}

impl MailboxSender {
    /// Queue a message. Returns false if the engine has already exited.
    pub fn send(&self, message: Message) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(mpsc::error::SendError(message)) => {
                tracing::debug!("Subtitle engine gone, dropping {}", message.kind());
                false
            }
        }
    }

    /// Whether the engine side is still receiving
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the mailbox, owned by the engine
#[derive(Debug)]
pub struct Mailbox {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Mailbox {
    /// Wait up to `wait` for one message
    pub async fn receive_timeout(&mut self, wait: Duration) -> Received {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(message)) => Received::Message(message),
            Ok(None) => Received::Closed,
            Err(_) => Received::Timeout,
        }
    }

    /// Take a queued message without waiting
    pub fn try_receive(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Discard everything queued. Returns the number of dropped messages.
    pub fn clear(&mut self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

/// Create a connected sender/mailbox pair
pub fn channel() -> (MailboxSender, Mailbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MailboxSender { tx }, Mailbox { rx })
}
