use serde::{Deserialize, Serialize};

/// The three playback actions that cross the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackKind {
    Play,
    Pause,
    Seek,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    NoMedia,
    LoadedPaused,
    LoadedPlaying,
}

/// Shared playback timeline, replicated last-writer-wins: whoever emitted
/// the most recent play/pause/seek/media-change determines the state both
/// sides converge to. Both the local user's actions and the peer's relayed
/// actions go through the same mutators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub video_id: Option<String>,
    pub playing: bool,
    pub position: f64,
}

impl PlaybackState {
    pub fn phase(&self) -> PlayerPhase {
        match (&self.video_id, self.playing) {
            (None, _) => PlayerPhase::NoMedia,
            (Some(_), false) => PlayerPhase::LoadedPaused,
            (Some(_), true) => PlayerPhase::LoadedPlaying,
        }
    }

    /// Switch the active media. Always lands in loaded-paused at zero.
    pub fn load(&mut self, video_id: String) {
        self.video_id = Some(video_id);
        self.playing = false;
        self.position = 0.0;
    }

    /// Apply a play/pause/seek at the given timeline position. Seek keeps
    /// the current play/pause status.
    pub fn apply(&mut self, kind: PlaybackKind, time: f64) {
        match kind {
            PlaybackKind::Play => {
                self.playing = true;
                self.position = time;
            }
            PlaybackKind::Pause => {
                self.playing = false;
                self.position = time;
            }
            PlaybackKind::Seek => {
                self.position = time;
            }
        }
    }
}

/// Receiver-side guard against out-of-order delivery of `video-state`
/// events: each client numbers its own events monotonically, and anything
/// at or below the highest value already applied is discarded.
#[derive(Debug, Default)]
pub struct SeqGuard {
    last_applied: Option<u64>,
}

impl SeqGuard {
    /// True if the event should be applied; records it as the newest.
    pub fn admit(&mut self, seq: u64) -> bool {
        match self.last_applied {
            Some(last) if seq <= last => false,
            _ => {
                self.last_applied = Some(seq);
                true
            }
        }
    }

    /// The other side restarts its numbering when it rejoins.
    pub fn reset(&mut self) {
        self.last_applied = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        let mut state = PlaybackState::default();
        assert_eq!(state.phase(), PlayerPhase::NoMedia);

        state.load("jf2gOSORoqU".into());
        assert_eq!(state.phase(), PlayerPhase::LoadedPaused);
        assert_eq!(state.position, 0.0);

        state.apply(PlaybackKind::Play, 12.5);
        assert_eq!(state.phase(), PlayerPhase::LoadedPlaying);
        assert_eq!(state.position, 12.5);

        state.apply(PlaybackKind::Pause, 42.0);
        assert_eq!(state.phase(), PlayerPhase::LoadedPaused);
        assert_eq!(state.position, 42.0);
    }

    #[test]
    fn test_seek_keeps_play_status() {
        let mut state = PlaybackState::default();
        state.load("jf2gOSORoqU".into());
        state.apply(PlaybackKind::Play, 0.0);
        state.apply(PlaybackKind::Seek, 90.0);
        assert!(state.playing);
        assert_eq!(state.position, 90.0);

        state.apply(PlaybackKind::Pause, 90.0);
        state.apply(PlaybackKind::Seek, 10.0);
        assert!(!state.playing);
        assert_eq!(state.position, 10.0);
    }

    #[test]
    fn test_load_resets_to_paused_at_zero() {
        let mut state = PlaybackState::default();
        state.load("first000000".into());
        state.apply(PlaybackKind::Play, 55.0);

        state.load("second00000".into());
        assert_eq!(state.phase(), PlayerPhase::LoadedPaused);
        assert_eq!(state.position, 0.0);
    }

    #[test]
    fn test_seq_guard_discards_stale() {
        let mut guard = SeqGuard::default();
        assert!(guard.admit(1));
        assert!(guard.admit(2));
        assert!(!guard.admit(2)); // duplicate
        assert!(!guard.admit(1)); // late arrival
        assert!(guard.admit(5)); // gaps are fine
        assert!(!guard.admit(4));
    }

    #[test]
    fn test_seq_guard_reset_admits_restarted_numbering() {
        let mut guard = SeqGuard::default();
        assert!(guard.admit(40));
        assert!(!guard.admit(1));
        guard.reset();
        assert!(guard.admit(1));
    }
}
