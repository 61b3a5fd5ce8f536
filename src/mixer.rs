//! Mute/solo gain routing.
//!
//! Audibility policy for tracks, kept apart from note data: toggling flags
//! never touches the timeline, it only changes the binary gain applied when
//! notes are scheduled. The maps are keyed by track index, matching track
//! identity within a session; removing a track renumbers the maps so flags
//! follow the tracks they were set on.

use std::collections::BTreeMap;

/// Per-track mute/solo state and the audibility rule derived from it.
///
/// Audibility of track `i` is `solo_active ? solo[i] : !muted[i]`, where
/// `solo_active` is true when any track is soloed. Gain is strictly binary:
/// a track is either heard at full level or not at all.
#[derive(Debug, Clone, Default)]
pub struct MuteSoloRouter {
    mutes: BTreeMap<usize, bool>,
    solos: BTreeMap<usize, bool>,
}

impl MuteSoloRouter {
    /// Creates a router with no flags set (everything audible).
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles the mute flag for a track.
    pub fn toggle_mute(&mut self, index: usize) {
        let entry = self.mutes.entry(index).or_insert(false);
        *entry = !*entry;
    }

    /// Toggles the solo flag for a track.
    pub fn toggle_solo(&mut self, index: usize) {
        let entry = self.solos.entry(index).or_insert(false);
        *entry = !*entry;
    }

    /// Returns whether a track is muted.
    pub fn is_muted(&self, index: usize) -> bool {
        self.mutes.get(&index).copied().unwrap_or(false)
    }

    /// Returns whether a track is soloed.
    pub fn is_soloed(&self, index: usize) -> bool {
        self.solos.get(&index).copied().unwrap_or(false)
    }

    /// Returns true when any track is soloed.
    pub fn solo_active(&self) -> bool {
        self.solos.values().any(|&s| s)
    }

    /// Returns whether the given track is currently audible.
    pub fn is_audible(&self, index: usize) -> bool {
        if self.solo_active() {
            self.is_soloed(index)
        } else {
            !self.is_muted(index)
        }
    }

    /// Returns the binary gain vector for `track_count` tracks.
    ///
    /// Derived on demand so it can never go stale against the flags or the
    /// track count.
    pub fn gains(&self, track_count: usize) -> Vec<f32> {
        (0..track_count)
            .map(|i| if self.is_audible(i) { 1.0 } else { 0.0 })
            .collect()
    }

    /// Renumbers both maps after the track at `index` was removed: its entry
    /// is dropped, keys above shift down by one, keys below are untouched.
    ///
    /// Must be applied in the same operation as the track removal itself;
    /// `Editor::remove_track` pairs the two.
    pub fn remove_track(&mut self, index: usize) {
        self.mutes = Self::shift_down(&self.mutes, index);
        self.solos = Self::shift_down(&self.solos, index);
    }

    fn shift_down(map: &BTreeMap<usize, bool>, removed: usize) -> BTreeMap<usize, bool> {
        map.iter()
            .filter_map(|(&k, &v)| {
                if k < removed {
                    Some((k, v))
                } else if k > removed {
                    Some((k - 1, v))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Clears all mute/solo state.
    pub fn clear(&mut self) {
        self.mutes.clear();
        self.solos.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_everything_audible() {
        let router = MuteSoloRouter::new();
        assert!(router.is_audible(0));
        assert!(router.is_audible(7));
        assert_eq!(router.gains(3), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_mute_silences_track() {
        let mut router = MuteSoloRouter::new();
        router.toggle_mute(1);
        assert_eq!(router.gains(3), vec![1.0, 0.0, 1.0]);

        router.toggle_mute(1);
        assert_eq!(router.gains(3), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_solo_dominates_mute() {
        let mut router = MuteSoloRouter::new();
        router.toggle_mute(0);
        router.toggle_solo(0);
        router.toggle_mute(2);

        // Track 0 is soloed: audible despite its mute flag.
        // Everything non-soloed is silenced regardless of mute state.
        assert_eq!(router.gains(3), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_solo_release_restores_mute_policy() {
        let mut router = MuteSoloRouter::new();
        router.toggle_mute(1);
        router.toggle_solo(2);
        assert_eq!(router.gains(3), vec![0.0, 0.0, 1.0]);

        router.toggle_solo(2);
        assert_eq!(router.gains(3), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_remove_track_renumbers_maps() {
        let mut router = MuteSoloRouter::new();
        router.toggle_mute(0);
        router.toggle_mute(2);

        // Removing index 1: key 0 stays, key 2 becomes key 1.
        router.remove_track(1);
        assert!(router.is_muted(0));
        assert!(router.is_muted(1));
        assert!(!router.is_muted(2));
    }

    #[test]
    fn test_remove_track_drops_own_entry() {
        let mut router = MuteSoloRouter::new();
        router.toggle_solo(1);
        router.toggle_solo(3);

        router.remove_track(1);
        assert!(!router.is_soloed(1));
        assert!(router.is_soloed(2));
        assert!(router.solo_active());
    }
}
