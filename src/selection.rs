//! Measure-based selection.
//!
//! Maps a contiguous measure range to absolute time windows over the
//! timeline, for building generation prompts. The selection is derived UI
//! state: it is never persisted and never outlives the timeline it indexes.

use crate::score::{Note, Timeline};

/// An inclusive range of selected measures, or no selection at all.
///
/// Selection follows a run-growth/collapse rule: from empty, toggling any
/// measure starts a single-measure range; toggling a measure inside the
/// current range clears the selection; toggling a measure outside grows the
/// range to the union of the old range and the new index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeasureSelection {
    range: Option<(u32, u32)>,
}

impl MeasureSelection {
    /// Creates an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the inclusive (start, end) measure range, or None when
    /// nothing is selected.
    pub fn range(&self) -> Option<(u32, u32)> {
        self.range
    }

    /// Returns true when nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.range.is_none()
    }

    /// Applies the toggle rule for the given measure index.
    pub fn toggle_measure(&mut self, index: u32) {
        self.range = match self.range {
            None => Some((index, index)),
            Some((start, end)) if index >= start && index <= end => None,
            Some((start, end)) => Some((start.min(index), end.max(index))),
        };
    }

    /// Clears the selection.
    pub fn clear(&mut self) {
        self.range = None;
    }

    /// Returns the selection's absolute time window `[start, end)` in
    /// seconds against the given timeline, or None when empty.
    ///
    /// The window covers whole measures: measure `m` spans
    /// `[m * S, (m + 1) * S)` where `S` is seconds-per-measure, so a
    /// non-empty selection always has `start < end`.
    pub fn time_window(&self, timeline: &Timeline) -> Option<(f64, f64)> {
        let (start, end) = self.range?;
        let spm = timeline.seconds_per_measure();
        Some((start as f64 * spm, (end + 1) as f64 * spm))
    }

    /// Returns all notes across the timeline's tracks whose start time falls
    /// inside the selected window. Empty when nothing is selected.
    pub fn extract_notes(&self, timeline: &Timeline) -> Vec<Note> {
        match self.time_window(timeline) {
            Some((start, end)) => collect_window(timeline, start, end),
            None => Vec::new(),
        }
    }

    /// Returns the notes in the `measures`-measure window immediately
    /// preceding the selection, for context prompts. The window clamps at
    /// time zero.
    pub fn extract_past(&self, timeline: &Timeline, measures: u32) -> Vec<Note> {
        match self.time_window(timeline) {
            Some((start, _)) => {
                let spm = timeline.seconds_per_measure();
                let from = (start - measures as f64 * spm).max(0.0);
                collect_window(timeline, from, start)
            }
            None => Vec::new(),
        }
    }

    /// Returns the notes in the `measures`-measure window immediately
    /// following the selection, for continuation prompts.
    pub fn extract_future(&self, timeline: &Timeline, measures: u32) -> Vec<Note> {
        match self.time_window(timeline) {
            Some((_, end)) => {
                let spm = timeline.seconds_per_measure();
                collect_window(timeline, end, end + measures as f64 * spm)
            }
            None => Vec::new(),
        }
    }
}

/// Collects notes starting in `[start, end)` across all tracks, in track
/// order then time order.
fn collect_window(timeline: &Timeline, start: f64, end: f64) -> Vec<Note> {
    timeline
        .tracks()
        .iter()
        .flat_map(|t| t.notes_starting_in(start, end).cloned())
        .collect()
}
