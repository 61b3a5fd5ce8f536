//! Core data model for musical timelines.
//!
//! This module provides the types for representing notes, tracks, and the
//! timeline they live on, plus the tempo/measure arithmetic everything else
//! is built on. Timing is stored in seconds so that generated material with
//! arbitrary source resolution can be spliced in without tick conversion;
//! ticks only appear at the MIDI codec boundary.

mod midi_decode;
mod midi_encode;
mod note;
mod timeline;
mod track;

pub use midi_decode::decode_midi;
pub use midi_encode::encode_midi;
pub use note::{Note, NoteId};
pub use timeline::Timeline;
pub use track::{Track, TrackId};

/// Ticks per beat (quarter note) used when encoding/decoding Standard MIDI
/// Files. Internal timing is in seconds; this only fixes the wire resolution.
pub const TICKS_PER_BEAT: u32 = 480;

/// Default tempo in beats per minute.
pub const DEFAULT_TEMPO: f64 = 120.0;

/// Default beats per measure (4/4 time).
pub const DEFAULT_BEATS_PER_MEASURE: u8 = 4;

/// Minimum measure count reported for display purposes, so an empty timeline
/// still presents an editable canvas.
pub const MIN_CANVAS_MEASURES: u32 = 12;

/// Converts a tick count to seconds at the given tempo.
pub fn ticks_to_seconds(ticks: u32, tempo_bpm: f64) -> f64 {
    let beats = ticks as f64 / TICKS_PER_BEAT as f64;
    beats * 60.0 / tempo_bpm
}

/// Converts seconds to ticks at the given tempo.
pub fn seconds_to_ticks(seconds: f64, tempo_bpm: f64) -> u32 {
    let beats = seconds * tempo_bpm / 60.0;
    (beats * TICKS_PER_BEAT as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_conversions() {
        // At 120 BPM, one beat = 0.5 seconds
        let seconds = ticks_to_seconds(TICKS_PER_BEAT, 120.0);
        assert!((seconds - 0.5).abs() < 1e-9);

        let ticks = seconds_to_ticks(0.5, 120.0);
        assert_eq!(ticks, TICKS_PER_BEAT);
    }

    #[test]
    fn test_tick_conversions_round_trip() {
        for &tempo in &[60.0, 90.0, 120.0, 174.0] {
            let ticks = seconds_to_ticks(ticks_to_seconds(1920, tempo), tempo);
            assert_eq!(ticks, 1920);
        }
    }
}
