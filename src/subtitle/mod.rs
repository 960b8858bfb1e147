//! Subtitle data model
//!
//! - Cues: timed text or bitmap payloads
//! - Tag parsing of inline styling into styled runs
//! - Per-source cue timelines
//! - Conversion of demuxed packets into cues

pub mod cue;
pub mod packet;
pub mod store;
pub mod tags;
