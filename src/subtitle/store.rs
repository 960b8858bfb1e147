//! Cue store
//!
//! An ordered-by-start timeline of cues for one subtitle source. Cues are
//! appended as the demuxer discovers them or replaced wholesale when a new
//! source is loaded. Stop times never decrease along the store, which is
//! what makes the binary search in [`CueStore::find_first_covering_or_after`]
//! valid.

use std::collections::VecDeque;
use std::ops::Index;

use super::cue::Cue;

/// Timeline of cues for one subtitle source
#[derive(Debug, Clone, Default)]
pub struct CueStore {
    cues: VecDeque<Cue>,
    /// When set, the oldest cue is evicted once the store holds this many
    capacity: Option<usize>,
}

impl CueStore {
    /// Unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Ring-buffer store keeping only the newest `capacity` cues
    pub fn bounded(capacity: usize) -> Self {
        Self {
            cues: VecDeque::with_capacity(capacity),
            capacity: Some(capacity.max(1)),
        }
    }

    /// Build a store from an already ordered sequence, clamping stops
    pub fn from_cues(cues: impl IntoIterator<Item = Cue>) -> Self {
        let mut store = Self::new();
        store.replace_all(cues);
        store
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Cue> {
        self.cues.get(index)
    }

    pub fn last(&self) -> Option<&Cue> {
        self.cues.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cue> {
        self.cues.iter()
    }

    /// Append a cue at the end of the timeline.
    ///
    /// If its stop time is earlier than the current last cue's stop, the
    /// stop is raised to match so stop times stay non-decreasing. Returns
    /// the stop time actually stored.
    pub fn append(&mut self, cue: Cue) -> i64 {
        let cue = match self.cues.back() {
            Some(last) if cue.stop() < last.stop() => {
                tracing::trace!(
                    "Clamping cue stop {} -> {} (start={})",
                    cue.stop(),
                    last.stop(),
                    cue.start()
                );
                let stop = last.stop();
                cue.with_stop_at_least(stop)
            }
            _ => cue,
        };

        if let Some(capacity) = self.capacity {
            while self.cues.len() >= capacity {
                self.cues.pop_front();
            }
        }

        let stop = cue.stop();
        self.cues.push_back(cue);
        stop
    }

    /// Replace the whole timeline. Any index previously taken into this
    /// store is meaningless afterwards.
    pub fn replace_all(&mut self, cues: impl IntoIterator<Item = Cue>) {
        self.cues.clear();
        for cue in cues {
            self.append(cue);
        }
    }

    /// Index of the first cue whose stop lies after `time`, or `len()` when
    /// every cue has already ended.
    pub fn find_first_covering_or_after(&self, time: i64) -> usize {
        self.cues.partition_point(|cue| cue.stop() <= time)
    }

    /// Discard all cues
    pub fn clear(&mut self) {
        self.cues.clear();
    }

    /// Take the cues out, leaving the store empty
    pub fn take(&mut self) -> Vec<Cue> {
        self.cues.drain(..).collect()
    }

    /// Copy of the cues, in order
    pub fn to_vec(&self) -> Vec<Cue> {
        self.cues.iter().cloned().collect()
    }
}

impl Index<usize> for CueStore {
    type Output = Cue;

    fn index(&self, index: usize) -> &Cue {
        &self.cues[index]
    }
}

impl FromIterator<Cue> for CueStore {
    fn from_iter<I: IntoIterator<Item = Cue>>(iter: I) -> Self {
        Self::from_cues(iter)
    }
}
