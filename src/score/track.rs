//! Track representation.
//!
//! A track is an ordered collection of notes bound to a MIDI channel and
//! instrument program. Audibility (mute/solo) is a routing concern and lives
//! outside the track; see the mixer module.

use super::note::{Note, NoteId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique track IDs.
static TRACK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a track within a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(u64);

impl TrackId {
    /// Generates a new unique track ID.
    pub fn new() -> Self {
        Self(TRACK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

/// A single track containing notes, sorted by start time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Unique identifier for this track.
    pub id: TrackId,

    /// Human-readable name for the track.
    pub name: String,

    /// MIDI channel (0-15). Channel 9 is reserved for drums in General MIDI.
    pub channel: u8,

    /// MIDI program number (0-127). Determines the instrument sound.
    pub program: u8,

    /// Collection of notes in this track, sorted by start time.
    notes: Vec<Note>,
}

impl Track {
    /// Creates a new empty track.
    pub fn new(name: impl Into<String>, channel: u8) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            channel: channel.min(15),
            program: 0, // Piano
            notes: Vec::new(),
        }
    }

    /// Adds a note to the track, maintaining sorted order by start time.
    ///
    /// Returns the NoteId of the added note.
    pub fn add_note(&mut self, note: Note) -> NoteId {
        let id = note.id;
        // Insertion point keeps equal-start notes in arrival order.
        let pos = self.notes.partition_point(|n| n.start <= note.start);
        self.notes.insert(pos, note);
        id
    }

    /// Creates and adds a new note to the track.
    pub fn create_note(&mut self, pitch: u8, start: f64, duration: f64, velocity: f32) -> NoteId {
        self.add_note(Note::new(pitch, start, duration, velocity))
    }

    /// Removes a note by its ID. Returns the removed note, or None.
    pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
        let pos = self.notes.iter().position(|n| n.id == id)?;
        Some(self.notes.remove(pos))
    }

    /// Returns all notes in the track (sorted by start time).
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Returns notes whose start time falls in the half-open window
    /// `[start, end)`.
    pub fn notes_starting_in(&self, start: f64, end: f64) -> impl Iterator<Item = &Note> {
        self.notes
            .iter()
            .skip_while(move |n| n.start < start)
            .take_while(move |n| n.start < end)
    }

    /// Returns true if the track already holds a note at the same pitch and
    /// (within `tolerance` seconds) the same start time.
    ///
    /// Used by the merge path to keep the no-duplicate-trigger invariant.
    pub fn has_note_at(&self, pitch: u8, start: f64, tolerance: f64) -> bool {
        self.notes
            .iter()
            .any(|n| n.pitch == pitch && (n.start - start).abs() <= tolerance)
    }

    /// Returns the end time of the last-sounding note, in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.notes.iter().map(Note::end).fold(0.0, f64::max)
    }

    /// Returns the number of notes in the track.
    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Clears all notes from the track.
    pub fn clear(&mut self) {
        self.notes.clear();
    }

    /// Returns a copy of this track (fresh id, same channel/program/name)
    /// containing only notes that start at or after `from`, re-based so the
    /// window start becomes time zero.
    pub fn window_from(&self, from: f64) -> Track {
        let mut out = Track::new(self.name.clone(), self.channel);
        out.program = self.program;
        for note in self.notes.iter().filter(|n| n.start >= from) {
            out.add_note(note.shifted(-from));
        }
        out
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::new("Track 1", 0)
    }
}
