use room_core::media::{extract_video_id, MediaUrlError};
use room_core::playback::{PlaybackKind, PlaybackState, PlayerPhase, SeqGuard};
use room_core::RoomEvent;

/// What the local player surface should do in response to a peer event.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Load(String),
    Play { position: f64 },
    Pause { position: f64 },
    Seek { position: f64 },
}

/// Keeps the local timeline converged with the peer's. Local actions
/// mutate state immediately and yield the event to emit; peer events are
/// applied last-writer-wins, guarded against out-of-order delivery by the
/// per-client sequence number they carry.
pub struct Synchronizer {
    state: PlaybackState,
    peer_guard: SeqGuard,
    next_seq: u64,
}

impl Synchronizer {
    pub fn new(restored_video: Option<String>) -> Self {
        let mut state = PlaybackState::default();
        if let Some(video_id) = restored_video {
            state.load(video_id);
        }
        Self {
            state,
            peer_guard: SeqGuard::default(),
            next_seq: 0,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Switch media from user input. Extraction failure is the caller's
    /// recoverable error: nothing is emitted and local state is untouched.
    pub fn select_media(&mut self, input: &str) -> Result<RoomEvent, MediaUrlError> {
        let video_id = extract_video_id(input)?;
        self.state.load(video_id.clone());
        Ok(RoomEvent::VideoChange { video_id })
    }

    pub fn play(&mut self) -> Option<RoomEvent> {
        self.local_action(PlaybackKind::Play, self.state.position)
    }

    pub fn pause(&mut self) -> Option<RoomEvent> {
        self.local_action(PlaybackKind::Pause, self.state.position)
    }

    pub fn seek(&mut self, position: f64) -> Option<RoomEvent> {
        self.local_action(PlaybackKind::Seek, position)
    }

    fn local_action(&mut self, kind: PlaybackKind, time: f64) -> Option<RoomEvent> {
        if self.state.phase() == PlayerPhase::NoMedia {
            return None;
        }
        self.state.apply(kind, time);
        self.next_seq += 1;
        Some(RoomEvent::VideoState {
            kind,
            time,
            seq: self.next_seq,
        })
    }

    /// Apply a peer-originated event. Returns the command for the player
    /// surface, or `None` when the event is stale or not playback-related.
    pub fn apply_remote(&mut self, event: &RoomEvent) -> Option<PlayerCommand> {
        match event {
            RoomEvent::VideoChange { video_id } => {
                self.state.load(video_id.clone());
                Some(PlayerCommand::Load(video_id.clone()))
            }
            RoomEvent::VideoState { kind, time, seq } => {
                if !self.peer_guard.admit(*seq) {
                    tracing::debug!("Discarding stale video-state (seq {})", seq);
                    return None;
                }
                self.state.apply(*kind, *time);
                Some(match kind {
                    PlaybackKind::Play => PlayerCommand::Play { position: *time },
                    PlaybackKind::Pause => PlayerCommand::Pause { position: *time },
                    PlaybackKind::Seek => PlayerCommand::Seek { position: *time },
                })
            }
            _ => None,
        }
    }

    /// The peer is gone; its replacement will number events from scratch.
    pub fn peer_left(&mut self) {
        self.peer_guard.reset();
    }
}
