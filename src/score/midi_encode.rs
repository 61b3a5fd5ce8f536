//! Standard MIDI File encoding.
//!
//! Encodes a [`Timeline`] into SMF binary data, the format generation
//! requests carry their prompt/context notes in. Produces Format 1
//! (multi-track) output:
//! - Track 0: tempo and time signature meta events
//! - Tracks 1-N: note data with program changes
//!
//! Mixer state (mute/solo) is routing-only and is never encoded.

use super::{seconds_to_ticks, Timeline, TICKS_PER_BEAT};

/// Writes a variable-length quantity (VLQ) used for delta times in MIDI.
///
/// VLQ encodes values using 7 bits per byte, with the MSB indicating
/// whether more bytes follow (1 = more bytes, 0 = last byte).
fn write_vlq(value: u32, buffer: &mut Vec<u8>) {
    if value == 0 {
        buffer.push(0);
        return;
    }

    let mut temp = value;
    let mut bytes = Vec::with_capacity(4);

    while temp > 0 {
        bytes.push((temp & 0x7F) as u8);
        temp >>= 7;
    }

    // Write bytes in reverse order with continuation bits
    for (i, &byte) in bytes.iter().rev().enumerate() {
        if i < bytes.len() - 1 {
            buffer.push(byte | 0x80);
        } else {
            buffer.push(byte);
        }
    }
}

/// MIDI event types for track data.
enum MidiEvent {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    ProgramChange { channel: u8, program: u8 },
    SetTempo { microseconds_per_beat: u32 },
    TimeSignature { numerator: u8 },
    TrackName { name: String },
    EndOfTrack,
}

/// A MIDI event pinned to an absolute tick, for sorting and delta encoding.
struct TimedEvent {
    tick: u32,
    event: MidiEvent,
    /// Priority for ordering events at the same tick (lower = first), so
    /// program changes precede notes and note-offs follow note-ons.
    priority: u8,
}

impl TimedEvent {
    fn new(tick: u32, event: MidiEvent, priority: u8) -> Self {
        Self {
            tick,
            event,
            priority,
        }
    }
}

/// Writes a single MIDI event to the buffer (without delta time).
fn write_event(event: &MidiEvent, buffer: &mut Vec<u8>) {
    match event {
        MidiEvent::NoteOn {
            channel,
            pitch,
            velocity,
        } => {
            buffer.push(0x90 | (channel & 0x0F));
            buffer.push(*pitch);
            buffer.push(*velocity);
        }
        MidiEvent::NoteOff { channel, pitch } => {
            buffer.push(0x80 | (channel & 0x0F));
            buffer.push(*pitch);
            buffer.push(0);
        }
        MidiEvent::ProgramChange { channel, program } => {
            buffer.push(0xC0 | (channel & 0x0F));
            buffer.push(*program);
        }
        MidiEvent::SetTempo {
            microseconds_per_beat,
        } => {
            // Meta event: FF 51 03 tt tt tt
            buffer.push(0xFF);
            buffer.push(0x51);
            buffer.push(0x03);
            buffer.push((microseconds_per_beat >> 16) as u8);
            buffer.push((microseconds_per_beat >> 8) as u8);
            buffer.push(*microseconds_per_beat as u8);
        }
        MidiEvent::TimeSignature { numerator } => {
            // Meta event: FF 58 04 nn dd cc bb
            // dd fixed at 2 (quarter-note denominator), cc = clocks per
            // metronome click, bb = 32nd notes per quarter.
            buffer.push(0xFF);
            buffer.push(0x58);
            buffer.push(0x04);
            buffer.push(*numerator);
            buffer.push(2);
            buffer.push(24);
            buffer.push(8);
        }
        MidiEvent::TrackName { name } => {
            // Meta event: FF 03 len text
            buffer.push(0xFF);
            buffer.push(0x03);
            let name_bytes = name.as_bytes();
            write_vlq(name_bytes.len() as u32, buffer);
            buffer.extend_from_slice(name_bytes);
        }
        MidiEvent::EndOfTrack => {
            buffer.push(0xFF);
            buffer.push(0x2F);
            buffer.push(0x00);
        }
    }
}

/// Builds a track chunk body from timed events, sorted and delta-encoded.
fn build_track_data(events: &mut [TimedEvent]) -> Vec<u8> {
    let mut buffer = Vec::new();
    events.sort_by(|a, b| a.tick.cmp(&b.tick).then(a.priority.cmp(&b.priority)));

    let mut last_tick = 0u32;
    for timed_event in events.iter() {
        let delta = timed_event.tick.saturating_sub(last_tick);
        write_vlq(delta, &mut buffer);
        write_event(&timed_event.event, &mut buffer);
        last_tick = timed_event.tick;
    }

    buffer
}

/// Appends a complete MTrk chunk to the output.
fn write_track_chunk(out: &mut Vec<u8>, track_data: &[u8]) {
    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
    out.extend_from_slice(track_data);
}

/// Encodes a timeline as SMF Format 1 bytes.
pub fn encode_midi(timeline: &Timeline) -> Vec<u8> {
    let mut out = Vec::new();
    let tempo = timeline.tempo_bpm;
    let end_tick = seconds_to_ticks(timeline.duration_seconds(), tempo);

    // Header chunk (MThd)
    let num_tracks = 1 + timeline.track_count() as u16;
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes()); // Format 1 (multi-track)
    out.extend_from_slice(&num_tracks.to_be_bytes());
    out.extend_from_slice(&(TICKS_PER_BEAT as u16).to_be_bytes());

    // Track 0: tempo and time signature
    {
        let mut events = vec![
            TimedEvent::new(
                0,
                MidiEvent::TrackName {
                    name: timeline.name.clone(),
                },
                0,
            ),
            TimedEvent::new(
                0,
                MidiEvent::TimeSignature {
                    numerator: timeline.beats_per_measure,
                },
                1,
            ),
            TimedEvent::new(
                0,
                MidiEvent::SetTempo {
                    microseconds_per_beat: (60_000_000.0 / tempo).round() as u32,
                },
                2,
            ),
            TimedEvent::new(end_tick, MidiEvent::EndOfTrack, 255),
        ];

        let track_data = build_track_data(&mut events);
        write_track_chunk(&mut out, &track_data);
    }

    // Tracks 1-N: note data
    for track in timeline.tracks() {
        let mut events = vec![
            TimedEvent::new(
                0,
                MidiEvent::TrackName {
                    name: track.name.clone(),
                },
                0,
            ),
            TimedEvent::new(
                0,
                MidiEvent::ProgramChange {
                    channel: track.channel,
                    program: track.program,
                },
                1,
            ),
        ];

        for note in track.notes() {
            events.push(TimedEvent::new(
                seconds_to_ticks(note.start, tempo),
                MidiEvent::NoteOn {
                    channel: track.channel,
                    pitch: note.pitch,
                    velocity: (note.velocity * 127.0).round() as u8,
                },
                10,
            ));
            events.push(TimedEvent::new(
                seconds_to_ticks(note.end(), tempo),
                MidiEvent::NoteOff {
                    channel: track.channel,
                    pitch: note.pitch,
                },
                11, // Note offs slightly after note ons at the same tick
            ));
        }

        let track_end = seconds_to_ticks(track.duration_seconds(), tempo).max(1);
        events.push(TimedEvent::new(track_end, MidiEvent::EndOfTrack, 255));

        let track_data = build_track_data(&mut events);
        write_track_chunk(&mut out, &track_data);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlq_encoding() {
        let mut buffer = Vec::new();

        write_vlq(0, &mut buffer);
        assert_eq!(buffer, vec![0x00]);
        buffer.clear();

        write_vlq(127, &mut buffer);
        assert_eq!(buffer, vec![0x7F]);
        buffer.clear();

        write_vlq(128, &mut buffer);
        assert_eq!(buffer, vec![0x81, 0x00]);
        buffer.clear();

        write_vlq(0x3FFF, &mut buffer);
        assert_eq!(buffer, vec![0xFF, 0x7F]);
        buffer.clear();

        write_vlq(0x4000, &mut buffer);
        assert_eq!(buffer, vec![0x81, 0x80, 0x00]);
    }

    #[test]
    fn test_header_layout() {
        let timeline = Timeline::with_default_track("Header");
        let bytes = encode_midi(&timeline);

        assert_eq!(&bytes[0..4], b"MThd");
        assert_eq!(&bytes[4..8], &6u32.to_be_bytes());
        // Format 1, two chunks (meta + one track)
        assert_eq!(&bytes[8..10], &1u16.to_be_bytes());
        assert_eq!(&bytes[10..12], &2u16.to_be_bytes());
        assert_eq!(&bytes[12..14], &(TICKS_PER_BEAT as u16).to_be_bytes());
    }
}
