//! Caption markup parser
//!
//! Turns raw caption lines carrying HTML-like (`<b>`, `<i>`, `<font color=..>`)
//! or ASS-like (`{\b1}`, `{\i0}`, `{\c&hBBGGRR&}`) markup into styled runs.
//!
//! Style state carries over line breaks: a tag opened on one line stays open
//! until it is closed, matching how SRT/SSA authors write multi-line cues.

use std::fmt;

// helper.
macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).unwrap())
    }};
}

/// One span of text sharing the same style
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    /// Canonical 0xRRGGBB colour when a colour tag is in effect
    pub color: Option<u32>,
}

impl StyledRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
            color: None,
        }
    }

    pub fn color_set(&self) -> bool {
        self.color.is_some()
    }

    /// Red channel of the run colour (0 when unset)
    pub fn red(&self) -> u8 {
        self.color.map(|c| (c >> 16) as u8).unwrap_or(0)
    }

    pub fn green(&self) -> u8 {
        self.color.map(|c| (c >> 8) as u8).unwrap_or(0)
    }

    pub fn blue(&self) -> u8 {
        self.color.map(|c| c as u8).unwrap_or(0)
    }
}

impl fmt::Display for StyledRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Runs of one visual line, left to right
pub type StyledLine = Vec<StyledRun>;

/// Style in effect at the current scan position
#[derive(Debug, Clone, Copy, Default)]
struct ScanState {
    bold: bool,
    italic: bool,
    color: bool,
    color_code: u32,
}

impl ScanState {
    fn run(&self, text: &str) -> StyledRun {
        StyledRun {
            text: text.to_string(),
            bold: self.bold,
            italic: self.italic,
            color: self.color.then_some(self.color_code),
        }
    }

    /// Apply one lowercased tag. Returns false when the tag is not understood.
    fn apply(&mut self, tag: &str) -> bool {
        match tag {
            "<b>" | "{\\b1}" => self.bold = true,
            "</b>" | "{\\b0}" if self.bold => self.bold = false,
            "<i>" | "{\\i1}" => self.italic = true,
            "</i>" | "{\\i0}" if self.italic => self.italic = false,
            "</font>" | "{\\c}" if self.color => self.color = false,
            _ if tag.starts_with("<font") => match html_color(&tag[5..]) {
                Some(code) => {
                    self.color = true;
                    self.color_code = code;
                }
                None => return false,
            },
            _ => match brace_color(tag) {
                Some(code) => {
                    self.color = true;
                    self.color_code = code;
                }
                None => return false,
            },
        }
        true
    }
}

/// `color=RRGGBB` inside a font tag, big-endian RGB
fn html_color(attrs: &str) -> Option<u32> {
    let caps = regex!(r#"color[ \t]*=[ \t"']*#?([a-f0-9]{6})"#).captures(attrs)?;
    u32::from_str_radix(caps.get(1)?.as_str(), 16).ok()
}

/// `{\c&hBBGGRR&}`, little-endian; swapped to canonical RGB
fn brace_color(tag: &str) -> Option<u32> {
    let caps = regex!(r"^\{\\c&h([a-f0-9]{2})([a-f0-9]{2})([a-f0-9]{2})&\}$").captures(tag)?;
    let rgb = format!("{}{}{}", &caps[3], &caps[2], &caps[1]);
    u32::from_str_radix(&rgb, 16).ok()
}

/// Parse raw caption lines into styled lines.
///
/// The output has exactly one entry per input line. Each line is trimmed
/// before scanning; empty segments between adjacent tags are not emitted.
/// Unknown tags are dropped.
pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> Vec<StyledLine> {
    let tags = regex!(r"(?i)(<[^>]*>|\{\\[^}]*\})");
    let mut state = ScanState::default();

    lines
        .iter()
        .map(|raw| {
            let line = raw.as_ref().trim();
            let mut runs = Vec::new();
            let mut old_pos = 0;

            for m in tags.find_iter(line) {
                if m.start() != old_pos {
                    runs.push(state.run(&line[old_pos..m.start()]));
                }
                old_pos = m.end();

                let tag = m.as_str().to_lowercase();
                if !state.apply(&tag) {
                    tracing::debug!("Dropping unrecognised subtitle tag {:?}", tag);
                }
            }

            if old_pos < line.len() {
                runs.push(state.run(&line[old_pos..]));
            }
            runs
        })
        .collect()
}

/// Plain text of a styled line, tags removed
pub fn line_text(line: &[StyledRun]) -> String {
    line.iter().map(|r| r.text.as_str()).collect()
}
