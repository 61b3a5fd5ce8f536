//! SoundFont-backed audio sink.
//!
//! Reference [`AudioSink`] implementation using rustysynth for synthesis
//! and rodio for output. Event firing is poll-driven: the host calls
//! [`SynthSink::pump`] on its frame cadence and due note on/offs are pushed
//! into the synthesizer. The transport clock is wall-clock based.

use super::{AudioSink, EventId};
use crate::score::Note;
use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamHandle, Source};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Sample rate for audio synthesis (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// Audio buffer size for low-latency playback.
/// Smaller = lower latency but higher CPU usage.
const BUFFER_SIZE: usize = 256;

/// Audio source that generates samples from the synthesizer.
/// Implements rodio's Source trait for playback.
struct SynthSource {
    synth: Arc<Mutex<Synthesizer>>,
    left_buf: Vec<f32>,
    right_buf: Vec<f32>,
    buf_pos: usize,
    /// Current channel (0 = left, 1 = right).
    channel: usize,
}

impl SynthSource {
    fn new(synth: Arc<Mutex<Synthesizer>>) -> Self {
        Self {
            synth,
            left_buf: vec![0.0; BUFFER_SIZE],
            right_buf: vec![0.0; BUFFER_SIZE],
            buf_pos: BUFFER_SIZE, // Start at end to trigger first render
            channel: 0,
        }
    }
}

impl Iterator for SynthSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.buf_pos >= BUFFER_SIZE {
            // The synthesizer outputs silence when no notes are sounding, so
            // rendering unconditionally keeps the stream warm.
            if let Ok(mut synth) = self.synth.lock() {
                synth.render(&mut self.left_buf, &mut self.right_buf);
            } else {
                self.left_buf.fill(0.0);
                self.right_buf.fill(0.0);
            }
            self.buf_pos = 0;
        }

        // Interleave stereo samples: L, R, L, R, ...
        let sample = if self.channel == 0 {
            self.left_buf[self.buf_pos]
        } else {
            self.right_buf[self.buf_pos]
        };

        self.channel = 1 - self.channel;
        if self.channel == 0 {
            self.buf_pos += 1;
        }

        Some(sample)
    }
}

impl Source for SynthSource {
    fn current_frame_len(&self) -> Option<usize> {
        None // Continuous stream
    }

    fn channels(&self) -> u16 {
        2 // Stereo
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None // Infinite stream
    }
}

/// One scheduled note with its firing bookkeeping.
struct ScheduledNote {
    at: f64,
    off_at: f64,
    pitch: u8,
    velocity: u8,
    channel: u8,
    gain: f32,
    on_fired: bool,
    off_fired: bool,
}

/// Wall-clock transport: a base position plus elapsed time while running.
#[derive(Debug, Default)]
struct TransportClock {
    base_seconds: f64,
    started_at: Option<Instant>,
}

impl TransportClock {
    fn position(&self) -> f64 {
        match self.started_at {
            Some(at) => self.base_seconds + at.elapsed().as_secs_f64(),
            None => self.base_seconds,
        }
    }

    fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    fn freeze(&mut self) {
        self.base_seconds = self.position();
        self.started_at = None;
    }

    fn set(&mut self, seconds: f64) {
        let was_running = self.started_at.is_some();
        self.base_seconds = seconds.max(0.0);
        self.started_at = was_running.then(Instant::now);
    }
}

/// SoundFont synthesizer sink.
///
/// Holds its own sorted event queue; [`SynthSink::pump`] fires everything
/// that has come due since the last call.
pub struct SynthSink {
    synth: Arc<Mutex<Synthesizer>>,
    /// Audio output stream (must be kept alive).
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    clock: TransportClock,
    events: Vec<ScheduledNote>,
    next_event_id: u64,
}

impl SynthSink {
    /// Creates a sink rendering through the given SoundFont.
    ///
    /// # Errors
    ///
    /// Returns an error if the SoundFont cannot be read or audio output
    /// cannot be initialized.
    pub fn new<P: AsRef<Path>>(soundfont_path: P) -> Result<Self> {
        let mut file = BufReader::new(File::open(soundfont_path.as_ref()).with_context(|| {
            format!(
                "Failed to open SoundFont: {}",
                soundfont_path.as_ref().display()
            )
        })?);
        let soundfont = Arc::new(
            SoundFont::new(&mut file)
                .map_err(|e| anyhow::anyhow!("Failed to load SoundFont: {:?}", e))?,
        );

        let settings = SynthesizerSettings::new(SAMPLE_RATE as i32);
        let synth = Synthesizer::new(&soundfont, &settings)
            .map_err(|e| anyhow::anyhow!("Failed to create synthesizer: {:?}", e))?;
        let synth = Arc::new(Mutex::new(synth));

        let (stream, stream_handle) =
            OutputStream::try_default().context("Failed to open audio output")?;

        let source = SynthSource::new(Arc::clone(&synth));
        stream_handle
            .play_raw(source)
            .context("Failed to start audio playback")?;

        Ok(Self {
            synth,
            _stream: stream,
            _stream_handle: stream_handle,
            clock: TransportClock::default(),
            events: Vec::new(),
            next_event_id: 0,
        })
    }

    /// Returns whether the transport clock is currently advancing.
    pub fn is_running(&self) -> bool {
        self.clock.started_at.is_some()
    }

    /// Fires every event that has come due. Call this on the host's frame
    /// cadence while playing; it is a no-op when paused or stopped.
    pub fn pump(&mut self) {
        if !self.is_running() {
            return;
        }
        let now = self.clock.position();
        let mut synth = match self.synth.lock() {
            Ok(synth) => synth,
            Err(_) => return,
        };

        for event in &mut self.events {
            if !event.on_fired && event.at <= now {
                event.on_fired = true;
                // Binary gain: a silenced track's notes never reach the
                // synthesizer at all.
                if event.gain >= 0.5 {
                    synth.note_on(
                        event.channel as i32,
                        event.pitch as i32,
                        event.velocity as i32,
                    );
                }
            }
            if event.on_fired && !event.off_fired && event.off_at <= now {
                event.off_fired = true;
                if event.gain >= 0.5 {
                    synth.note_off(event.channel as i32, event.pitch as i32);
                }
            }
        }
    }

    /// Releases all sounding notes.
    ///
    /// `immediate` skips the release envelope.
    fn all_notes_off(&self, immediate: bool) {
        if let Ok(mut synth) = self.synth.lock() {
            synth.note_off_all(immediate);
        }
    }

    /// Re-arms the fired flags so events at or after `position` will fire
    /// again; everything earlier is marked as already played.
    fn rearm_from(&mut self, position: f64) {
        for event in &mut self.events {
            event.on_fired = event.at < position;
            event.off_fired = event.off_at < position;
        }
    }
}

impl AudioSink for SynthSink {
    fn schedule_note(&mut self, at_seconds: f64, note: &Note, channel: u8, gain: f32) -> EventId {
        self.next_event_id += 1;
        let id = EventId(self.next_event_id);
        let position = self.clock.position();
        self.events.push(ScheduledNote {
            at: at_seconds,
            off_at: at_seconds + note.duration,
            pitch: note.pitch,
            velocity: (note.velocity * 127.0).round() as u8,
            channel,
            gain,
            // Events scheduled behind the cursor never fire; an extended
            // timeline must not replay its past when rescheduled mid-flight.
            on_fired: at_seconds < position,
            off_fired: at_seconds + note.duration < position,
        });
        id
    }

    fn cancel_all(&mut self) {
        let cancelled = self.events.len();
        self.events.clear();
        self.all_notes_off(false);
        if cancelled > 0 {
            debug!(cancelled, "cancelled scheduled events");
        }
    }

    fn prepare_track(&mut self, channel: u8, program: u8) {
        if let Ok(mut synth) = self.synth.lock() {
            // Program change is MIDI command 0xC0
            synth.process_midi_message(channel as i32, 0xC0, program as i32, 0);
        }
    }

    fn start(&mut self) {
        self.clock.start();
    }

    fn pause(&mut self) {
        self.clock.freeze();
        self.all_notes_off(false);
    }

    fn stop(&mut self) {
        self.clock.freeze();
        self.clock.set(0.0);
        self.all_notes_off(true);
        self.rearm_from(0.0);
    }

    fn seek(&mut self, seconds: f64) {
        self.clock.set(seconds);
        self.all_notes_off(false);
        self.rearm_from(seconds);
    }

    fn position_seconds(&self) -> f64 {
        self.clock.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_frozen_by_default() {
        let clock = TransportClock::default();
        assert_eq!(clock.position(), 0.0);
    }

    #[test]
    fn test_clock_set_while_frozen() {
        let mut clock = TransportClock::default();
        clock.set(12.5);
        assert_eq!(clock.position(), 12.5);
        clock.freeze();
        assert_eq!(clock.position(), 12.5);
    }

    #[test]
    fn test_clock_advances_only_while_running() {
        let mut clock = TransportClock::default();
        clock.start();
        std::thread::sleep(Duration::from_millis(15));
        clock.freeze();
        let frozen = clock.position();
        assert!(frozen >= 0.015);

        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(clock.position(), frozen);
    }
}
