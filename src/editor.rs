//! Editing facade.
//!
//! Bundles the timeline with its routing and selection state so that edits
//! touching more than one of them happen as a single operation. The
//! important case is track removal: the mixer's index-keyed maps must be
//! renumbered in the same call that removes the track, or the flags drift
//! onto the wrong tracks.

use crate::mixer::MuteSoloRouter;
use crate::score::{Note, Timeline, Track, TrackId};
use crate::selection::MeasureSelection;

/// A timeline under edit, with its mute/solo routing and measure selection.
#[derive(Debug, Clone, Default)]
pub struct Editor {
    pub timeline: Timeline,
    pub mixer: MuteSoloRouter,
    pub selection: MeasureSelection,
}

impl Editor {
    /// Creates an editor over the given timeline.
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            mixer: MuteSoloRouter::new(),
            selection: MeasureSelection::new(),
        }
    }

    /// Creates and adds a track with an auto-assigned channel.
    pub fn create_track(&mut self, name: impl Into<String>) -> TrackId {
        self.timeline.create_track(name)
    }

    /// Removes the track at `index` and renumbers the mute/solo maps in the
    /// same operation. Returns the removed track.
    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        let removed = self.timeline.remove_track(index)?;
        self.mixer.remove_track(index);
        Some(removed)
    }

    /// Resets timeline, routing, and selection.
    pub fn clear(&mut self) {
        self.timeline.clear();
        self.mixer.clear();
        self.selection.clear();
    }

    /// Toggles the measure at `index` per the selection's growth/collapse
    /// rule.
    pub fn toggle_measure(&mut self, index: u32) {
        self.selection.toggle_measure(index);
    }

    /// Toggles mute for the track at `index`.
    pub fn toggle_mute(&mut self, index: usize) {
        self.mixer.toggle_mute(index);
    }

    /// Toggles solo for the track at `index`.
    pub fn toggle_solo(&mut self, index: usize) {
        self.mixer.toggle_solo(index);
    }

    /// Returns the notes inside the current selection, for prompts.
    pub fn selected_notes(&self) -> Vec<Note> {
        self.selection.extract_notes(&self.timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_track_editor() -> Editor {
        let mut editor = Editor::new(Timeline::new("Test"));
        editor.create_track("A");
        editor.create_track("B");
        editor.create_track("C");
        editor
    }

    #[test]
    fn test_remove_track_renumbers_mute_map() {
        // Mute map {0: true, 2: true}; removing index 1 must yield
        // {0: true, 1: true} over the remaining two tracks.
        let mut editor = three_track_editor();
        editor.toggle_mute(0);
        editor.toggle_mute(2);

        let removed = editor.remove_track(1).unwrap();
        assert_eq!(removed.name, "B");
        assert_eq!(editor.timeline.track_count(), 2);
        assert!(editor.mixer.is_muted(0));
        assert!(editor.mixer.is_muted(1));
        assert_eq!(editor.mixer.gains(2), vec![0.0, 0.0]);
    }

    #[test]
    fn test_remove_missing_track_leaves_maps_alone() {
        let mut editor = three_track_editor();
        editor.toggle_mute(2);
        assert!(editor.remove_track(9).is_none());
        assert!(editor.mixer.is_muted(2));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut editor = three_track_editor();
        editor.toggle_mute(1);
        editor.toggle_measure(3);
        editor
            .timeline
            .track_at_mut(0)
            .unwrap()
            .create_note(60, 0.0, 1.0, 0.8);

        editor.clear();
        assert_eq!(editor.timeline.track_count(), 0);
        assert_eq!(editor.timeline.duration_seconds(), 0.0);
        assert!(!editor.mixer.is_muted(1));
        assert!(editor.selection.is_empty());
    }

    #[test]
    fn test_selected_notes_flow() {
        let mut editor = three_track_editor();
        editor
            .timeline
            .track_at_mut(0)
            .unwrap()
            .create_note(60, 2.0, 0.5, 0.8);
        editor.toggle_measure(1); // [2.0, 4.0) at 120 BPM 4/4

        let notes = editor.selected_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 60);
    }
}
