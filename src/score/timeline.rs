//! Timeline container.
//!
//! A timeline is the canonical multi-track note store for one playback
//! session, together with the tempo and time-signature data that turns
//! measure indices into seconds. There is a single logical owner per
//! session: all mutation goes through explicit edit operations or the
//! segment merge path, never concurrently.

use super::track::{Track, TrackId};
use super::{DEFAULT_BEATS_PER_MEASURE, DEFAULT_TEMPO, MIN_CANVAS_MEASURES};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A complete multi-track timeline with tempo settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    /// Timeline name.
    pub name: String,

    /// Tempo in beats per minute.
    pub tempo_bpm: f64,

    /// Time signature numerator (beats per measure).
    pub beats_per_measure: u8,

    /// Collection of tracks. Index within this vector is the track's
    /// identity for the duration of a session.
    tracks: Vec<Track>,

    /// Next available MIDI channel for auto-assignment.
    /// Skips channel 9 (drums) for melodic tracks.
    next_channel: u8,
}

impl Timeline {
    /// Creates a new empty timeline with default settings
    /// (120 BPM, 4/4 time).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tempo_bpm: DEFAULT_TEMPO,
            beats_per_measure: DEFAULT_BEATS_PER_MEASURE,
            tracks: Vec::new(),
            next_channel: 0,
        }
    }

    /// Creates a new timeline with a single default track.
    pub fn with_default_track(name: impl Into<String>) -> Self {
        let mut timeline = Self::new(name);
        timeline.add_track(Track::new("Track 1", 0));
        timeline
    }

    /// Returns the length of one measure in seconds:
    /// `(60 / tempo) * beats_per_measure`.
    pub fn seconds_per_measure(&self) -> f64 {
        (60.0 / self.tempo_bpm) * self.beats_per_measure as f64
    }

    /// Returns the total duration in seconds.
    ///
    /// Always derived from the notes (max end time across tracks), so it can
    /// never go stale after a merge or edit.
    pub fn duration_seconds(&self) -> f64 {
        self.tracks
            .iter()
            .map(Track::duration_seconds)
            .fold(0.0, f64::max)
    }

    /// Returns the exact duration expressed in measures (fractional).
    ///
    /// This is the value the generation loop's buffer arithmetic uses; the
    /// display floor of [`Timeline::total_measures`] must not leak into it.
    pub fn duration_measures(&self) -> f64 {
        self.duration_seconds() / self.seconds_per_measure()
    }

    /// Returns the measure count rounded up for display, with a minimum
    /// canvas size so an empty timeline remains editable.
    pub fn total_measures(&self) -> u32 {
        let exact = self.duration_measures();
        (exact.ceil() as u32).max(MIN_CANVAS_MEASURES)
    }

    /// Adds a track to the timeline. Returns the TrackId of the added track.
    pub fn add_track(&mut self, track: Track) -> TrackId {
        let id = track.id;
        self.tracks.push(track);
        id
    }

    /// Creates and adds a new track with an auto-assigned channel.
    pub fn create_track(&mut self, name: impl Into<String>) -> TrackId {
        let channel = self.next_channel;
        // Skip drum channel (9) for melodic tracks
        self.next_channel = if self.next_channel == 8 {
            10
        } else if self.next_channel >= 15 {
            0 // Wrap around (multiple tracks can share channels)
        } else {
            self.next_channel + 1
        };

        self.add_track(Track::new(name, channel))
    }

    /// Removes a track by positional index. Returns the removed track.
    ///
    /// Any index-keyed side table (the mixer's mute/solo maps) must be
    /// renumbered in the same operation; `Editor::remove_track` pairs the
    /// two calls.
    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        Some(self.tracks.remove(index))
    }

    /// Returns a reference to a track by index.
    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Returns a mutable reference to a track by index.
    pub fn track_at_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    /// Returns a reference to a track by its ID.
    pub fn get_track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Returns all tracks in the timeline.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Returns an iterator over mutable track references.
    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut()
    }

    /// Returns the number of tracks.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Resets to an empty, zero-duration timeline, keeping tempo settings.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.next_channel = 0;
    }

    /// Extracts the trailing `measures` measures as a minimal standalone
    /// timeline, re-based to start at time zero.
    ///
    /// Tempo, time signature, and per-track channel/program metadata are
    /// preserved so a generator can condition on the context without any
    /// other state. A window longer than the timeline starts at zero.
    pub fn tail_context(&self, measures: u32) -> Timeline {
        let window = self.seconds_per_measure() * measures as f64;
        let from = (self.duration_seconds() - window).max(0.0);

        let mut context = Timeline::new(self.name.clone());
        context.tempo_bpm = self.tempo_bpm;
        context.beats_per_measure = self.beats_per_measure;
        for track in &self.tracks {
            context.add_track(track.window_from(from));
        }
        context
    }

    /// Serializes the timeline to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a timeline from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Saves the timeline to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// Loads a timeline from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Saves the timeline in the compact binary format.
    pub fn save_to_binary<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let data = bincode::serialize(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, data)
    }

    /// Loads a timeline from the compact binary format.
    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let data = fs::read(path)?;
        bincode::deserialize(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::with_default_track("Untitled")
    }
}
