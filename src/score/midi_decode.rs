//! Standard MIDI File decoding.
//!
//! Decodes SMF binary data (the generator's result format) into a
//! [`Timeline`]. Supports Format 0 (single track) and Format 1
//! (multi-track) files.
//!
//! # Limitations
//!
//! - Only note on/off events become notes
//! - The first tempo and time signature found anywhere in the file apply
//!   globally; mid-file tempo changes are ignored
//! - Program changes set the track instrument
//! - Other MIDI events (pitch bend, aftertouch, CCs) are ignored

use super::{Note, Timeline, Track};
use crate::error::EngineError;
use midly::{Format, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use tracing::debug;

/// State for tracking open notes during decoding.
/// Key is (channel, pitch), value is (start_tick, velocity).
type ActiveNotes = HashMap<(u8, u8), (u32, u8)>;

/// Decodes SMF bytes into a timeline.
///
/// # Errors
///
/// Returns [`EngineError::Parse`] if the data is not a decodable MIDI file.
pub fn decode_midi(data: &[u8], name: impl Into<String>) -> Result<Timeline, EngineError> {
    let smf = Smf::parse(data).map_err(|e| EngineError::Parse(e.to_string()))?;

    let source_ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int() as u32,
        Timing::Timecode(_, _) => {
            return Err(EngineError::Parse(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };

    if smf.header.format == Format::Sequential {
        return Err(EngineError::Parse(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    let mut timeline = Timeline::new(name);

    // First pass: tempo and time signature. They often live in a meta-only
    // track; the tick-to-seconds conversion below needs them up front.
    for track in &smf.tracks {
        for event in track {
            if let TrackEventKind::Meta(meta) = event.kind {
                match meta {
                    midly::MetaMessage::Tempo(tempo_val) => {
                        let usec_per_beat = tempo_val.as_int();
                        if usec_per_beat > 0 {
                            timeline.tempo_bpm = 60_000_000.0 / usec_per_beat as f64;
                        }
                    }
                    midly::MetaMessage::TimeSignature(num, _, _, _) => {
                        timeline.beats_per_measure = num;
                    }
                    _ => {}
                }
            }
        }
    }

    let tempo = timeline.tempo_bpm;
    let tick_seconds = 60.0 / tempo / source_ticks_per_beat as f64;

    // Second pass: notes, split per channel within each SMF track.
    for (track_idx, track) in smf.tracks.iter().enumerate() {
        for parsed in parse_track(track, track_idx, tick_seconds) {
            if parsed.note_count() > 0 {
                timeline.add_track(parsed);
            }
        }
    }

    debug!(
        tracks = timeline.track_count(),
        tempo_bpm = timeline.tempo_bpm,
        duration_seconds = timeline.duration_seconds(),
        "decoded midi segment"
    );
    Ok(timeline)
}

/// Parses note data out of a single SMF track, one output track per channel.
fn parse_track(track: &[midly::TrackEvent], track_idx: usize, tick_seconds: f64) -> Vec<Track> {
    let mut channel_tracks: HashMap<u8, Track> = HashMap::new();
    let mut active_notes: ActiveNotes = HashMap::new();
    let mut track_name: Option<String> = None;
    let mut current_tick: u32 = 0;

    for event in track {
        current_tick += event.delta.as_int();

        match event.kind {
            TrackEventKind::Meta(midly::MetaMessage::TrackName(name_bytes)) => {
                if let Ok(name) = std::str::from_utf8(name_bytes) {
                    track_name = Some(name.to_string());
                }
            }
            TrackEventKind::Midi { channel, message } => {
                let ch = channel.as_int();

                channel_tracks.entry(ch).or_insert_with(|| {
                    let name = track_name
                        .clone()
                        .unwrap_or_else(|| format!("Track {}", track_idx + 1));
                    Track::new(name, ch)
                });

                match message {
                    midly::MidiMessage::NoteOn { key, vel } => {
                        let pitch = key.as_int();
                        let velocity = vel.as_int();

                        if velocity > 0 {
                            active_notes.insert((ch, pitch), (current_tick, velocity));
                        } else {
                            // Note on with velocity 0 = note off
                            close_note(
                                &mut channel_tracks,
                                &mut active_notes,
                                ch,
                                pitch,
                                current_tick,
                                tick_seconds,
                            );
                        }
                    }
                    midly::MidiMessage::NoteOff { key, vel: _ } => {
                        close_note(
                            &mut channel_tracks,
                            &mut active_notes,
                            ch,
                            key.as_int(),
                            current_tick,
                            tick_seconds,
                        );
                    }
                    midly::MidiMessage::ProgramChange { program } => {
                        if let Some(track) = channel_tracks.get_mut(&ch) {
                            track.program = program.as_int();
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    // Close any notes the file left hanging, with a one-beat fallback length.
    let fallback = tick_seconds * super::TICKS_PER_BEAT as f64;
    for ((ch, pitch), (start_tick, velocity)) in active_notes {
        if let Some(track) = channel_tracks.get_mut(&ch) {
            let start = start_tick as f64 * tick_seconds;
            track.add_note(Note::new(pitch, start, fallback, velocity as f32 / 127.0));
        }
    }

    let mut tracks: Vec<Track> = channel_tracks.into_values().collect();
    tracks.sort_by_key(|t| t.channel);
    tracks
}

fn close_note(
    channel_tracks: &mut HashMap<u8, Track>,
    active_notes: &mut ActiveNotes,
    ch: u8,
    pitch: u8,
    current_tick: u32,
    tick_seconds: f64,
) {
    if let Some((start_tick, velocity)) = active_notes.remove(&(ch, pitch)) {
        let duration_ticks = current_tick.saturating_sub(start_tick).max(1);
        if let Some(track) = channel_tracks.get_mut(&ch) {
            track.add_note(Note::new(
                pitch,
                start_tick as f64 * tick_seconds,
                duration_ticks as f64 * tick_seconds,
                velocity as f32 / 127.0,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::encode_midi;
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_midi(b"not a midi file", "Bad").unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut original = Timeline::new("Round Trip");
        original.tempo_bpm = 120.0;
        original.create_track("Lead");
        {
            let track = original.track_at_mut(0).unwrap();
            track.program = 65;
            track.create_note(60, 0.0, 0.5, 0.8);
            track.create_note(64, 1.0, 0.25, 0.5);
        }

        let bytes = encode_midi(&original);
        let decoded = decode_midi(&bytes, "Round Trip").unwrap();

        assert!((decoded.tempo_bpm - 120.0).abs() < 0.5);
        assert_eq!(decoded.track_count(), 1);
        let track = decoded.track_at(0).unwrap();
        assert_eq!(track.program, 65);
        assert_eq!(track.note_count(), 2);
        let note = &track.notes()[0];
        assert_eq!(note.pitch, 60);
        assert!((note.start - 0.0).abs() < 0.01);
        assert!((note.duration - 0.5).abs() < 0.01);
        assert!((note.velocity - 0.8).abs() < 0.02);
    }

    #[test]
    fn test_decode_splits_channels() {
        let mut original = Timeline::new("Two Channels");
        original.create_track("A"); // channel 0
        original.create_track("B"); // channel 1
        original
            .track_at_mut(0)
            .unwrap()
            .create_note(60, 0.0, 0.5, 0.8);
        original
            .track_at_mut(1)
            .unwrap()
            .create_note(48, 0.0, 0.5, 0.8);

        let decoded = decode_midi(&encode_midi(&original), "Two Channels").unwrap();
        assert_eq!(decoded.track_count(), 2);
        let channels: Vec<u8> = decoded.tracks().iter().map(|t| t.channel).collect();
        assert_eq!(channels, vec![0, 1]);
    }
}
