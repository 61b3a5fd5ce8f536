//! Note representation.
//!
//! A note is a single pitch with absolute timing in seconds and a normalized
//! velocity. Notes are value types: mutable while editing, treated as
//! immutable once handed to the transport for scheduling.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique note IDs.
static NOTE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a note within a timeline.
/// Allows tracking notes across edits without index-based lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId(u64);

impl NoteId {
    /// Generates a new unique note ID.
    ///
    /// Thread-safe: uses atomic increment internally.
    pub fn new() -> Self {
        Self(NOTE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value (for serialization/debugging).
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

/// A single note with absolute timing and dynamics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier for this note instance.
    pub id: NoteId,

    /// MIDI note number (0-127). 60 = Middle C (C4).
    pub pitch: u8,

    /// Start time in seconds from the beginning of the timeline.
    pub start: f64,

    /// Duration in seconds. Always positive.
    pub duration: f64,

    /// Normalized velocity in [0.0, 1.0]. 0.0 is silent, 1.0 is maximum.
    pub velocity: f32,
}

impl Note {
    /// Creates a new note, clamping pitch and velocity into range.
    ///
    /// Non-positive durations are bumped to a 1 ms floor so a note always
    /// occupies a nonzero span.
    pub fn new(pitch: u8, start: f64, duration: f64, velocity: f32) -> Self {
        Self {
            id: NoteId::new(),
            pitch: pitch.min(127),
            start: start.max(0.0),
            duration: duration.max(0.001),
            velocity: velocity.clamp(0.0, 1.0),
        }
    }

    /// Returns the end time of this note (start + duration).
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Checks if this note overlaps the half-open range `[start, end)`.
    pub fn overlaps_range(&self, start: f64, end: f64) -> bool {
        self.start < end && self.end() > start
    }

    /// Checks if this note is sounding at a specific time.
    pub fn is_active_at(&self, seconds: f64) -> bool {
        seconds >= self.start && seconds < self.end()
    }

    /// Creates a copy of this note with a new unique ID, shifted in time.
    ///
    /// Used when splicing generated material: the copy must not alias the
    /// source note's identity. A negative offset clamps at zero.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            id: NoteId::new(),
            pitch: self.pitch,
            start: (self.start + offset).max(0.0),
            duration: self.duration,
            velocity: self.velocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_creation() {
        let note = Note::new(60, 0.0, 0.5, 0.8);
        assert_eq!(note.pitch, 60);
        assert!((note.start - 0.0).abs() < f64::EPSILON);
        assert!((note.duration - 0.5).abs() < f64::EPSILON);
        assert!((note.velocity - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_note_clamping() {
        let note = Note::new(200, -1.0, -0.5, 2.0);
        assert_eq!(note.pitch, 127);
        assert_eq!(note.start, 0.0);
        assert!(note.duration > 0.0);
        assert_eq!(note.velocity, 1.0);
    }

    #[test]
    fn test_note_overlap() {
        let note = Note::new(60, 1.0, 2.0, 0.8); // 1.0-3.0
        assert!(note.overlaps_range(0.0, 1.5));
        assert!(note.overlaps_range(2.0, 4.0));
        assert!(note.overlaps_range(0.5, 3.5));
        assert!(!note.overlaps_range(0.0, 1.0));
        assert!(!note.overlaps_range(3.0, 4.0));
    }

    #[test]
    fn test_note_active() {
        let note = Note::new(60, 1.0, 2.0, 0.8);
        assert!(!note.is_active_at(0.99));
        assert!(note.is_active_at(1.0));
        assert!(note.is_active_at(2.0));
        assert!(!note.is_active_at(3.0));
    }

    #[test]
    fn test_shifted_gets_fresh_id() {
        let note = Note::new(60, 1.0, 0.5, 0.8);
        let moved = note.shifted(2.0);
        assert_ne!(moved.id, note.id);
        assert!((moved.start - 3.0).abs() < 1e-9);
        assert_eq!(moved.pitch, note.pitch);
    }
}
