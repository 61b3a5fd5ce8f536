//! Transport scheduling.
//!
//! Converts a timeline plus the mixer's audibility vector into time-stamped
//! sink events, and owns the playback controls built on top of the sink's
//! clock. The one hard rule here: replacing the schedule is atomic.
//! Everything previously issued is cancelled before anything new is issued,
//! and the playback cursor is never touched in the process. That is what
//! keeps a timeline extension mid-playback free of doubled triggers.

use crate::audio::{AudioSink, EventId};
use crate::mixer::MuteSoloRouter;
use crate::score::Timeline;
use std::time::Duration;
use tracing::debug;

/// Current playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Not playing, position reset to start.
    Stopped,
    /// Currently playing.
    Playing,
    /// Paused at current position.
    Paused,
}

/// Playback scheduler over an [`AudioSink`].
pub struct Transport<S: AudioSink> {
    sink: S,
    state: PlaybackState,
    looping: bool,
    loop_start: f64,
    /// Loop end in seconds; None means the whole timeline.
    loop_end: Option<f64>,
    handles: Vec<EventId>,
}

impl<S: AudioSink> Transport<S> {
    /// Creates a stopped transport over the given sink.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            state: PlaybackState::Stopped,
            looping: false,
            loop_start: 0.0,
            loop_end: None,
            handles: Vec::new(),
        }
    }

    /// Returns a reference to the underlying sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Returns a mutable reference to the underlying sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Returns the current playback state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Returns whether the transport is currently playing.
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Starts or resumes playback.
    pub fn play(&mut self) {
        self.sink.start();
        self.state = PlaybackState::Playing;
    }

    /// Pauses playback at the current position.
    pub fn pause(&mut self) {
        self.sink.pause();
        self.state = PlaybackState::Paused;
    }

    /// Stops playback and resets the cursor to time zero.
    pub fn stop(&mut self) {
        self.sink.stop();
        self.state = PlaybackState::Stopped;
    }

    /// Moves the cursor to an absolute position in seconds.
    pub fn seek(&mut self, seconds: f64) {
        self.sink.seek(seconds);
    }

    /// Returns the cursor position in seconds.
    pub fn position_seconds(&self) -> f64 {
        self.sink.position_seconds()
    }

    /// Returns normalized progress through the timeline in [0, 1].
    pub fn progress(&self, timeline: &Timeline) -> f64 {
        let duration = timeline.duration_seconds();
        if duration <= 0.0 {
            return 0.0;
        }
        (self.position_seconds() / duration).clamp(0.0, 1.0)
    }

    /// Returns the minimum refresh cadence for progress reporting: one
    /// 16th note at the timeline's tempo. UI redraw polls at this rate,
    /// decoupled from audio-accurate event firing.
    pub fn tick_interval(&self, timeline: &Timeline) -> Duration {
        Duration::from_secs_f64(60.0 / timeline.tempo_bpm / 4.0)
    }

    /// Enables or disables loop mode. Bounds default to the whole timeline.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Sets explicit loop bounds in seconds. A `None` end tracks the
    /// timeline's (possibly growing) duration.
    pub fn set_loop_bounds(&mut self, start: f64, end: Option<f64>) {
        self.loop_start = start.max(0.0);
        self.loop_end = end;
    }

    /// Returns the number of currently issued schedule handles.
    pub fn scheduled_count(&self) -> usize {
        self.handles.len()
    }

    /// Atomically replaces the schedule with the timeline's current notes.
    ///
    /// All previously issued handles are cancelled before any new event is
    /// issued, and the cursor is left alone: only the set of scheduled
    /// future events changes, not elapsed time. One handle is issued per
    /// note of every audible track; inaudible tracks contribute nothing.
    pub fn reschedule(&mut self, timeline: &Timeline, router: &MuteSoloRouter) {
        self.sink.cancel_all();
        self.handles.clear();

        for (index, track) in timeline.tracks().iter().enumerate() {
            if !router.is_audible(index) {
                continue;
            }
            self.sink.prepare_track(track.channel, track.program);
            for note in track.notes() {
                let id = self.sink.schedule_note(note.start, note, track.channel, 1.0);
                self.handles.push(id);
            }
        }

        debug!(
            handles = self.handles.len(),
            position = self.position_seconds(),
            "schedule replaced"
        );
    }

    /// Performs the loop wrap when the cursor passes the loop end. Call on
    /// the host's refresh cadence while playing.
    pub fn update(&mut self, timeline: &Timeline) {
        if !self.looping || self.state != PlaybackState::Playing {
            return;
        }
        let end = self.loop_end.unwrap_or_else(|| timeline.duration_seconds());
        if end > self.loop_start && self.position_seconds() >= end {
            self.sink.seek(self.loop_start);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::ManualSink;

    fn two_track_timeline() -> Timeline {
        // 120 BPM 4/4: 2 seconds per measure.
        let mut timeline = Timeline::new("Test");
        timeline.create_track("Lead"); // channel 0
        timeline.create_track("Bass"); // channel 1
        timeline.track_at_mut(0).unwrap().program = 65;
        timeline
            .track_at_mut(0)
            .unwrap()
            .create_note(60, 0.0, 1.0, 0.8);
        timeline
            .track_at_mut(0)
            .unwrap()
            .create_note(62, 2.0, 1.0, 0.8);
        timeline
            .track_at_mut(1)
            .unwrap()
            .create_note(36, 0.0, 2.0, 0.8);
        timeline
    }

    #[test]
    fn test_reschedule_issues_one_handle_per_audible_note() {
        let timeline = two_track_timeline();
        let router = MuteSoloRouter::new();
        let mut transport = Transport::new(ManualSink::new());

        transport.reschedule(&timeline, &router);
        assert_eq!(transport.scheduled_count(), 3);
        assert_eq!(transport.sink().events.len(), 3);
        assert!(transport.sink().prepared.contains(&(0, 65)));
    }

    #[test]
    fn test_reschedule_skips_inaudible_tracks() {
        let timeline = two_track_timeline();
        let mut router = MuteSoloRouter::new();
        router.toggle_mute(0);
        let mut transport = Transport::new(ManualSink::new());

        transport.reschedule(&timeline, &router);
        assert_eq!(transport.scheduled_count(), 1);
        assert!(transport.sink().events.iter().all(|e| e.channel == 1));
    }

    #[test]
    fn test_reschedule_is_atomic() {
        let timeline = two_track_timeline();
        let router = MuteSoloRouter::new();
        let mut transport = Transport::new(ManualSink::new());

        transport.reschedule(&timeline, &router);
        transport.reschedule(&timeline, &router);

        // The second pass cancelled everything before issuing anew: no
        // stacked duplicates.
        assert_eq!(transport.sink().cancel_calls, 2);
        assert_eq!(transport.sink().events.len(), 3);
        assert_eq!(transport.scheduled_count(), 3);
    }

    #[test]
    fn test_reschedule_preserves_cursor() {
        let timeline = two_track_timeline();
        let router = MuteSoloRouter::new();
        let mut transport = Transport::new(ManualSink::new());

        transport.play();
        transport.sink_mut().advance(3.25);
        transport.reschedule(&timeline, &router);

        assert!((transport.position_seconds() - 3.25).abs() < 1e-9);
        assert!(transport.is_playing());
    }

    #[test]
    fn test_stop_resets_cursor() {
        let mut transport = Transport::new(ManualSink::new());
        transport.play();
        transport.sink_mut().advance(5.0);
        transport.stop();

        assert_eq!(transport.state(), PlaybackState::Stopped);
        assert_eq!(transport.position_seconds(), 0.0);
    }

    #[test]
    fn test_pause_keeps_cursor() {
        let mut transport = Transport::new(ManualSink::new());
        transport.play();
        transport.sink_mut().advance(5.0);
        transport.pause();

        assert_eq!(transport.state(), PlaybackState::Paused);
        assert!((transport.position_seconds() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_progress_normalized() {
        let timeline = two_track_timeline(); // duration 3.0
        let mut transport = Transport::new(ManualSink::new());

        assert_eq!(transport.progress(&timeline), 0.0);
        transport.sink_mut().advance(1.5);
        assert!((transport.progress(&timeline) - 0.5).abs() < 1e-9);
        transport.sink_mut().advance(10.0);
        assert_eq!(transport.progress(&timeline), 1.0);
    }

    #[test]
    fn test_progress_empty_timeline_is_zero() {
        let timeline = Timeline::new("Empty");
        let transport = Transport::new(ManualSink::new());
        assert_eq!(transport.progress(&timeline), 0.0);
    }

    #[test]
    fn test_loop_wraps_to_start() {
        let timeline = two_track_timeline(); // duration 3.0
        let mut transport = Transport::new(ManualSink::new());
        transport.set_looping(true);

        transport.play();
        transport.sink_mut().advance(3.5);
        transport.update(&timeline);
        assert_eq!(transport.position_seconds(), 0.0);
    }

    #[test]
    fn test_loop_respects_explicit_bounds() {
        let timeline = two_track_timeline();
        let mut transport = Transport::new(ManualSink::new());
        transport.set_looping(true);
        transport.set_loop_bounds(1.0, Some(2.0));

        transport.play();
        transport.sink_mut().advance(2.1);
        transport.update(&timeline);
        assert!((transport.position_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tick_interval_is_sixteenth_note() {
        let timeline = two_track_timeline(); // 120 BPM
        let transport = Transport::new(ManualSink::new());
        let tick = transport.tick_interval(&timeline);
        assert!((tick.as_secs_f64() - 0.125).abs() < 1e-9);
    }
}
