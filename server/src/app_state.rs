use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use room_core::RoomEvent;

pub type SharedState = Arc<AppState>;

/// One room's member set: session id -> handle for pushing raw outbound
/// frames to that session's writer task. All mutation of a room happens
/// under its map entry, so join/leave/forward are serialized per room.
#[derive(Default)]
pub struct Room {
    members: HashMap<String, mpsc::UnboundedSender<String>>,
}

pub struct AppState {
    // Map of room id -> active members. Rooms are created on first join
    // and garbage-collected when the last member leaves.
    pub rooms: DashMap<String, Room>,
}

impl AppState {
    pub fn new() -> SharedState {
        Arc::new(Self {
            rooms: DashMap::new(),
        })
    }

    /// Add a session to a room. Idempotent; any client that supplies a room
    /// id may join it (possession of the id is the trust model).
    pub fn join(&self, room_id: &str, session_id: &str, tx: mpsc::UnboundedSender<String>) {
        let mut room = self.rooms.entry(room_id.to_string()).or_default();
        room.members.insert(session_id.to_string(), tx);
        tracing::info!(
            "Session {} joined room {} ({} member(s))",
            session_id,
            room_id,
            room.members.len()
        );
    }

    /// Rebroadcast a raw frame to the members of a room. The sender is
    /// excluded unless `include_sender` is set (only `video-change` wants
    /// the echo). Forwarding into an empty or unknown room is a silent
    /// no-op, and a dead member never aborts fan-out to the rest.
    pub fn forward(&self, room_id: &str, sender_id: &str, text: &str, include_sender: bool) {
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };
        for (member_id, tx) in &room.members {
            if member_id == sender_id && !include_sender {
                continue;
            }
            let _ = tx.send(text.to_string());
        }
    }

    /// Deliver a frame to every member of a room. Used by the out-of-band
    /// push ingress, which has no sender inside the room.
    pub fn broadcast(&self, room_id: &str, text: &str) {
        self.forward(room_id, "", text, true);
    }

    /// Drop a session from every room it belonged to, collect empty rooms,
    /// and tell the remaining members it is gone.
    pub fn remove_session(&self, session_id: &str) {
        let mut affected = Vec::new();
        self.rooms.retain(|room_id, room| {
            if room.members.remove(session_id).is_some() {
                affected.push(room_id.clone());
            }
            !room.members.is_empty()
        });

        for room_id in affected {
            let frame = RoomEvent::PeerLeft {
                session_id: session_id.to_string(),
            }
            .into_frame(&room_id);
            if let Ok(text) = frame.to_json() {
                self.forward(&room_id, session_id, &text, false);
            }
            tracing::info!("Session {} removed from room {}", session_id, room_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_core::Frame;

    fn member(state: &SharedState, room: &str, id: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        state.join(room, id, tx);
        rx
    }

    #[tokio::test]
    async fn test_forward_excludes_sender() {
        let state = AppState::new();
        let mut a = member(&state, "r1", "a");
        let mut b = member(&state, "r1", "b");

        state.forward("r1", "a", r#"{"event":"x","roomId":"r1"}"#, false);
        assert_eq!(b.recv().await.unwrap(), r#"{"event":"x","roomId":"r1"}"#);
        assert!(a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forward_with_echo_reaches_everyone() {
        let state = AppState::new();
        let mut a = member(&state, "r1", "a");
        let mut b = member(&state, "r1", "b");
        let mut c = member(&state, "r1", "c");

        state.forward("r1", "a", "frame", true);
        for rx in [&mut a, &mut b, &mut c] {
            assert_eq!(rx.recv().await.unwrap(), "frame");
        }
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let state = AppState::new();
        let mut a = member(&state, "r1", "a");
        let mut other = member(&state, "r2", "x");

        state.forward("r1", "nobody", "frame", false);
        assert_eq!(a.recv().await.unwrap(), "frame");
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forward_to_empty_room_is_a_silent_no_op() {
        let state = AppState::new();
        state.forward("ghost", "a", "frame", false);
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let state = AppState::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.join("r1", "a", tx.clone());
        state.join("r1", "a", tx);

        state.forward("r1", "other", "frame", false);
        assert_eq!(rx.recv().await.unwrap(), "frame");
        assert!(rx.try_recv().is_err()); // delivered once, not twice
    }

    #[tokio::test]
    async fn test_removed_session_gets_nothing_and_peers_learn_it_left() {
        let state = AppState::new();
        let mut a = member(&state, "r1", "a");
        let mut b = member(&state, "r1", "b");

        state.remove_session("a");

        // Remaining member is told explicitly.
        let frame = Frame::parse(&b.recv().await.unwrap()).unwrap();
        assert_eq!(frame.event, "peer-left");
        assert_eq!(frame.payload["sessionId"], "a");

        // Nothing reaches the departed session afterwards.
        state.forward("r1", "b", "frame", false);
        assert!(a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_rooms_are_garbage_collected() {
        let state = AppState::new();
        let _a = member(&state, "r1", "a");
        let _b = member(&state, "r2", "a");
        assert_eq!(state.rooms.len(), 2);

        state.remove_session("a");
        assert_eq!(state.rooms.len(), 0);
    }

    #[tokio::test]
    async fn test_dead_member_does_not_break_fanout() {
        let state = AppState::new();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        state.join("r1", "dead", dead_tx);
        let mut b = member(&state, "r1", "b");

        state.forward("r1", "other", "frame", false);
        assert_eq!(b.recv().await.unwrap(), "frame");
    }
}
