//! Segment merge.
//!
//! Stitches a freshly generated segment onto the end of a live composition.
//! The generator echoes the context window it was conditioned on at the head
//! of each segment; only material past that echo is appended, time-shifted
//! to continue the composition, so the overlap region never triggers twice.

use crate::score::Timeline;
use tracing::{debug, warn};

/// Tolerance in seconds when deciding whether a segment note lies inside the
/// echoed context. Generators jitter note onsets slightly around the
/// context boundary.
pub const CONTEXT_EPSILON: f64 = 0.1;

/// Tolerance in seconds for treating two notes of equal pitch as the same
/// trigger when deduplicating.
const DUPLICATE_EPSILON: f64 = 1e-3;

/// Appends the new material of `segment` onto `composition`.
///
/// The first `context_measures` measures of the segment are assumed to echo
/// the prompt context and are discarded. Remaining notes are shifted by
/// `composition.duration - context_duration` so they continue seamlessly
/// from the composition's end. Segment tracks are matched to composition
/// tracks by channel identity, falling back to positional index.
///
/// Returns the number of notes appended. Zero is a valid outcome (the
/// segment held nothing beyond its context); callers treat it as a no-op
/// extension, not an error. The composition's duration is derived from its
/// notes, so it needs no explicit recompute here.
pub fn append_segment(
    composition: &mut Timeline,
    segment: &Timeline,
    context_measures: u32,
) -> usize {
    let context_duration = context_measures as f64 * composition.seconds_per_measure();
    let shift_amount = composition.duration_seconds() - context_duration;

    let mut appended = 0;

    for index in 0..composition.track_count() {
        let channel = match composition.track_at(index) {
            Some(track) => track.channel,
            None => continue,
        };

        // Match by channel if possible, else by position.
        let source = segment
            .tracks()
            .iter()
            .find(|t| t.channel == channel)
            .or_else(|| segment.track_at(index));

        let Some(source) = source else {
            warn!(track = index, channel, "segment has no matching track");
            continue;
        };

        let incoming: Vec<_> = source
            .notes()
            .iter()
            .filter(|n| n.start >= context_duration - CONTEXT_EPSILON)
            .map(|n| n.shifted(shift_amount))
            .collect();

        let Some(target) = composition.track_at_mut(index) else {
            continue;
        };
        for note in incoming {
            if target.has_note_at(note.pitch, note.start, DUPLICATE_EPSILON) {
                continue;
            }
            target.add_note(note);
            appended += 1;
        }
    }

    if appended == 0 {
        warn!(
            context_measures,
            segment_tracks = segment.track_count(),
            "merge appended no notes"
        );
    } else {
        debug!(
            appended,
            duration_seconds = composition.duration_seconds(),
            "merged segment into composition"
        );
    }

    appended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Track;

    /// 120 BPM 4/4 composition (2 s/measure) with one channel-0 track
    /// holding notes through `measures` measures.
    fn composition(measures: u32) -> Timeline {
        let mut timeline = Timeline::new("Comp");
        timeline.create_track("Lead");
        let track = timeline.track_at_mut(0).unwrap();
        for m in 0..measures {
            track.create_note(60, m as f64 * 2.0, 2.0, 0.8);
        }
        timeline
    }

    /// A segment echoing `context` measures then adding `fresh` new notes,
    /// one per measure, on the given channel.
    fn segment(context: u32, fresh: u32, channel: u8) -> Timeline {
        let mut timeline = Timeline::new("Segment");
        timeline.add_track(Track::new("Gen", channel));
        let track = timeline.track_at_mut(0).unwrap();
        for m in 0..context {
            track.create_note(60, m as f64 * 2.0, 2.0, 0.8);
        }
        for m in 0..fresh {
            track.create_note(72, (context + m) as f64 * 2.0, 2.0, 0.8);
        }
        timeline
    }

    #[test]
    fn test_appends_only_past_context() {
        let mut comp = composition(4); // 8 seconds
        let seg = segment(4, 2, 0);

        let appended = append_segment(&mut comp, &seg, 4);
        assert_eq!(appended, 2);

        // Fresh notes land right after the old end: shift = 8 - 8 = 0, so
        // segment times 8.0 and 10.0 stay put.
        let track = comp.track_at(0).unwrap();
        let fresh: Vec<f64> = track
            .notes()
            .iter()
            .filter(|n| n.pitch == 72)
            .map(|n| n.start)
            .collect();
        assert_eq!(fresh, vec![8.0, 10.0]);
        assert!((comp.duration_seconds() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_shift_when_composition_longer_than_context() {
        // 8 measures = 16 seconds; context covers the last 4 measures, so
        // shift = 16 - 8 = 8 and fresh notes continue at 16s.
        let mut comp = composition(8);
        let seg = segment(4, 1, 0);

        append_segment(&mut comp, &seg, 4);
        let last = comp.track_at(0).unwrap().notes().last().unwrap().clone();
        assert_eq!(last.pitch, 72);
        assert!((last.start - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_context_only_segment_is_noop() {
        let mut comp = composition(4);
        let before = comp.to_json().unwrap();

        let seg = segment(4, 0, 0);
        let appended = append_segment(&mut comp, &seg, 4);

        assert_eq!(appended, 0);
        assert_eq!(comp.to_json().unwrap(), before);
    }

    #[test]
    fn test_jitter_tolerance_at_context_boundary() {
        let mut comp = composition(4);
        let mut seg = Timeline::new("Segment");
        seg.create_track("Gen");
        // Note nominally at the 8.0s boundary, jittered 0.05s early: still
        // counted as new material.
        seg.track_at_mut(0)
            .unwrap()
            .create_note(72, 7.95, 1.0, 0.8);
        // Note well inside the context: discarded.
        seg.track_at_mut(0).unwrap().create_note(73, 7.0, 1.0, 0.8);

        let appended = append_segment(&mut comp, &seg, 4);
        assert_eq!(appended, 1);
        assert!(comp.track_at(0).unwrap().notes().iter().all(|n| n.pitch != 73));
    }

    #[test]
    fn test_no_duplicate_pitch_start_pairs() {
        let mut comp = composition(4);

        // A generator glitch: the same fresh note emitted twice.
        let mut seg = segment(4, 1, 0);
        seg.track_at_mut(0).unwrap().create_note(72, 8.0, 2.0, 0.8);

        let appended = append_segment(&mut comp, &seg, 4);
        assert_eq!(appended, 1);

        let track = comp.track_at(0).unwrap();
        for (i, a) in track.notes().iter().enumerate() {
            for b in track.notes().iter().skip(i + 1) {
                assert!(
                    a.pitch != b.pitch || (a.start - b.start).abs() > 1e-3,
                    "duplicate trigger at pitch {} start {}",
                    a.pitch,
                    a.start
                );
            }
        }
    }

    #[test]
    fn test_track_matching_by_channel_over_position() {
        let mut comp = Timeline::new("Comp");
        comp.add_track(Track::new("Drums", 9));
        comp.add_track(Track::new("Lead", 0));
        comp.track_at_mut(1).unwrap().create_note(60, 0.0, 8.0, 0.8);

        // Segment has its channel-0 track first: channel identity must win
        // over position.
        let mut seg = Timeline::new("Segment");
        seg.add_track(Track::new("Gen", 0));
        seg.track_at_mut(0)
            .unwrap()
            .create_note(72, 8.0, 1.0, 0.8);

        append_segment(&mut comp, &seg, 4);
        assert_eq!(comp.track_at(0).unwrap().note_count(), 0);
        assert_eq!(comp.track_at(1).unwrap().note_count(), 2);
    }

    #[test]
    fn test_duration_monotonically_non_decreasing() {
        let mut comp = composition(4);
        let mut last = comp.duration_seconds();
        for _ in 0..3 {
            let seg = segment(4, 2, 0);
            append_segment(&mut comp, &seg, 4);
            let now = comp.duration_seconds();
            assert!(now >= last);
            last = now;
        }
    }
}
