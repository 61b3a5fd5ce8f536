//! Audio output abstraction.
//!
//! The engine core schedules notes against the [`AudioSink`] trait and never
//! talks to an audio backend directly. A sink owns the transport clock and
//! the actual event firing; the scheduler layer above it decides *what* is
//! scheduled and when the schedule is atomically replaced.

pub mod synth;

pub use synth::SynthSink;

use crate::score::Note;

/// Handle for one scheduled note event, issued by the sink.
///
/// Cancellation is all-or-nothing ([`AudioSink::cancel_all`]); handles exist
/// so the scheduler can account for what it issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub u64);

/// A playback backend: schedules note events against a monotonic transport
/// clock measured in seconds.
pub trait AudioSink {
    /// Schedules a note (attack and release) at an absolute transport time,
    /// with a per-track gain multiplier. Returns a handle for bookkeeping.
    fn schedule_note(&mut self, at_seconds: f64, note: &Note, channel: u8, gain: f32) -> EventId;

    /// Cancels every scheduled event. Notes already sounding are released.
    fn cancel_all(&mut self);

    /// Binds an instrument program to a channel ahead of playback.
    fn prepare_track(&mut self, channel: u8, program: u8);

    /// Starts or resumes the transport clock.
    fn start(&mut self);

    /// Pauses the transport clock, keeping the current position.
    fn pause(&mut self);

    /// Stops the transport clock and resets the position to zero.
    fn stop(&mut self);

    /// Moves the transport clock to an absolute position in seconds.
    fn seek(&mut self, seconds: f64);

    /// Returns the current transport position in seconds.
    fn position_seconds(&self) -> f64;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Manual-clock sink used by scheduler and session tests.

    use super::*;

    /// One recorded schedule call.
    #[derive(Debug, Clone)]
    pub struct RecordedEvent {
        pub at: f64,
        pub pitch: u8,
        pub channel: u8,
        pub gain: f32,
    }

    /// An [`AudioSink`] with a hand-advanced clock that records every call.
    #[derive(Debug, Default)]
    pub struct ManualSink {
        pub events: Vec<RecordedEvent>,
        pub cancel_calls: usize,
        pub prepared: Vec<(u8, u8)>,
        pub running: bool,
        position: f64,
        next_id: u64,
    }

    impl ManualSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Advances the clock, as if audio had played for `seconds`.
        pub fn advance(&mut self, seconds: f64) {
            self.position += seconds;
        }
    }

    impl AudioSink for ManualSink {
        fn schedule_note(
            &mut self,
            at_seconds: f64,
            note: &Note,
            channel: u8,
            gain: f32,
        ) -> EventId {
            self.events.push(RecordedEvent {
                at: at_seconds,
                pitch: note.pitch,
                channel,
                gain,
            });
            self.next_id += 1;
            EventId(self.next_id)
        }

        fn cancel_all(&mut self) {
            self.events.clear();
            self.cancel_calls += 1;
        }

        fn prepare_track(&mut self, channel: u8, program: u8) {
            self.prepared.push((channel, program));
        }

        fn start(&mut self) {
            self.running = true;
        }

        fn pause(&mut self) {
            self.running = false;
        }

        fn stop(&mut self) {
            self.running = false;
            self.position = 0.0;
        }

        fn seek(&mut self, seconds: f64) {
            self.position = seconds.max(0.0);
        }

        fn position_seconds(&self) -> f64 {
            self.position
        }
    }
}
