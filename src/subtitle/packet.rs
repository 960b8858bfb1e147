//! Demuxed subtitle packets
//!
//! Converts one subtitle packet handed over by the demuxer into a [`Cue`].
//! Timestamps arrive in microseconds and are truncated to milliseconds.
//! Bitmap codecs are decoded upstream; the packet carries the decoded
//! subpicture.

use bytes::Bytes;

use super::cue::{Cue, ImagePayload};

/// Number of leading comma-separated fields in an SSA/ASS event packet
const SSA_PREFIX_FIELDS: usize = 8;

/// Subtitle codec of a demuxed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleCodec {
    SubRip,
    Ssa,
    Ass,
    DvdSubtitle,
    /// Anything the engine does not display
    Other,
}

impl SubtitleCodec {
    /// Whether packets of this codec become cues at all
    pub fn is_supported(self) -> bool {
        !matches!(self, SubtitleCodec::Other)
    }

    /// Check if this is a text-based subtitle format
    pub fn is_text(self) -> bool {
        matches!(
            self,
            SubtitleCodec::SubRip | SubtitleCodec::Ssa | SubtitleCodec::Ass
        )
    }

    /// Check if this is a bitmap subtitle format
    pub fn is_bitmap(self) -> bool {
        matches!(self, SubtitleCodec::DvdSubtitle)
    }

    /// Get subtitle format name
    pub fn name(self) -> &'static str {
        match self {
            SubtitleCodec::SubRip => "SubRip (SRT)",
            SubtitleCodec::Ssa | SubtitleCodec::Ass => "ASS/SSA",
            SubtitleCodec::DvdSubtitle => "DVD (Bitmap)",
            SubtitleCodec::Other => "Unknown",
        }
    }
}

/// Output of the bitmap subtitle decoder for one packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBitmap {
    /// Display start relative to the packet pts, in ms
    pub start_display_ms: u32,
    /// Display end relative to the packet pts, in ms
    pub end_display_ms: u32,
    /// First rectangle of the decoded subpicture
    pub image: ImagePayload,
}

/// A subtitle packet as delivered by the demuxer
#[derive(Debug, Clone)]
pub struct SubtitlePacket {
    pub codec: SubtitleCodec,
    /// Presentation timestamp in microseconds
    pub pts_us: i64,
    /// Duration in microseconds
    pub duration_us: i64,
    /// Raw packet payload (text codecs)
    pub data: Bytes,
    /// Decoded subpicture (bitmap codecs); `None` if the decoder produced nothing
    pub bitmap: Option<DecodedBitmap>,
}

impl SubtitlePacket {
    /// Text packet
    pub fn text(codec: SubtitleCodec, pts_us: i64, duration_us: i64, data: impl Into<Bytes>) -> Self {
        Self {
            codec,
            pts_us,
            duration_us,
            data: data.into(),
            bitmap: None,
        }
    }

    /// Decoded DVD subpicture packet
    pub fn dvd(pts_us: i64, duration_us: i64, bitmap: Option<DecodedBitmap>) -> Self {
        Self {
            codec: SubtitleCodec::DvdSubtitle,
            pts_us,
            duration_us,
            data: Bytes::new(),
            bitmap,
        }
    }

    pub fn start_ms(&self) -> i64 {
        self.pts_us / 1000
    }

    pub fn stop_ms(&self) -> i64 {
        self.start_ms() + self.duration_us / 1000
    }

    /// Build the cue for this packet.
    ///
    /// Returns `None` for unsupported codecs, text packets without any
    /// non-blank line and bitmap packets the decoder produced nothing for.
    pub fn to_cue(&self) -> Option<Cue> {
        if !self.codec.is_supported() {
            return None;
        }

        let start = self.start_ms();
        if self.codec.is_bitmap() {
            let bitmap = self.bitmap.as_ref()?;
            let shown = bitmap.end_display_ms as i64 - bitmap.start_display_ms as i64;
            return Some(Cue::image(start, start + shown, bitmap.image.clone()));
        }

        let lines = text_lines(self.codec, &self.data);
        if lines.is_empty() {
            return None;
        }
        Some(Cue::text(start, self.stop_ms(), lines))
    }
}

/// Split a text packet into display lines.
///
/// SSA/ASS event fields before the text are skipped. Lines break on the
/// literal `\N` marker and on newlines; lines holding only whitespace are
/// dropped.
pub fn text_lines(codec: SubtitleCodec, data: &[u8]) -> Vec<String> {
    let data = match data.iter().position(|&b| b == 0) {
        Some(nul) => &data[..nul],
        None => data,
    };
    let text = String::from_utf8_lossy(data);

    let mut body: &str = &text;
    if matches!(codec, SubtitleCodec::Ssa | SubtitleCodec::Ass) {
        body = match body.match_indices(',').nth(SSA_PREFIX_FIELDS - 1) {
            Some((i, _)) => &body[i + 1..],
            None => "",
        };
    }

    body.split("\\N")
        .flat_map(|piece| piece.split('\n'))
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
