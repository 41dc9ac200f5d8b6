use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::frame::Frame;
use crate::playback::PlaybackKind;

/// Event names as they appear on the wire.
pub mod name {
    pub const JOIN_ROOM: &str = "join-room";
    pub const SEND_MESSAGE: &str = "send-message";
    pub const RECEIVE_MESSAGE: &str = "receive-message";
    pub const VIDEO_CHANGE: &str = "video-change";
    pub const VIDEO_STATE: &str = "video-state";
    pub const WEBRTC_OFFER: &str = "webrtc-offer";
    pub const WEBRTC_ANSWER: &str = "webrtc-answer";
    pub const WEBRTC_ICE_CANDIDATE: &str = "webrtc-ice-candidate";
    pub const EMOJI_REACTION: &str = "emoji-reaction";
    pub const PEER_LEFT: &str = "peer-left";
}

/// A room-scoped event as clients understand it. The relay never builds
/// these; it forwards raw frames. Chat is asymmetric on the wire: clients
/// emit `send-message` and receive `receive-message`, both carrying the
/// same payload shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Chat {
        sender: String,
        text: String,
    },
    VideoChange {
        video_id: String,
    },
    VideoState {
        kind: PlaybackKind,
        time: f64,
        seq: u64,
    },
    Offer {
        signal: String,
    },
    Answer {
        signal: String,
    },
    IceCandidate {
        candidate: String,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u16>,
    },
    Reaction {
        emoji: String,
        placement: f32,
    },
    PeerLeft {
        session_id: String,
    },
}

#[derive(Serialize, Deserialize)]
struct ChatPayload {
    sender: String,
    text: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoChangePayload {
    video_id: String,
}

#[derive(Serialize, Deserialize)]
struct VideoStatePayload {
    #[serde(rename = "type")]
    kind: PlaybackKind,
    time: f64,
    #[serde(default)]
    seq: u64,
}

#[derive(Serialize, Deserialize)]
struct SignalPayload {
    signal: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IceCandidatePayload {
    candidate: String,
    #[serde(default)]
    sdp_mid: Option<String>,
    #[serde(default)]
    sdp_m_line_index: Option<u16>,
}

#[derive(Serialize, Deserialize)]
struct ReactionPayload {
    emoji: String,
    #[serde(default)]
    placement: f32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeerLeftPayload {
    session_id: String,
}

impl RoomEvent {
    /// Decode a relayed frame into a typed event. Returns `None` for
    /// unknown event names and for payloads that do not match the expected
    /// shape; callers log and drop those rather than fail.
    pub fn from_frame(frame: &Frame) -> Option<RoomEvent> {
        let payload = frame.payload.clone();
        match frame.event.as_str() {
            name::RECEIVE_MESSAGE => {
                let p: ChatPayload = serde_json::from_value(payload).ok()?;
                Some(RoomEvent::Chat {
                    sender: p.sender,
                    text: p.text,
                })
            }
            name::VIDEO_CHANGE => {
                let p: VideoChangePayload = serde_json::from_value(payload).ok()?;
                Some(RoomEvent::VideoChange {
                    video_id: p.video_id,
                })
            }
            name::VIDEO_STATE => {
                let p: VideoStatePayload = serde_json::from_value(payload).ok()?;
                Some(RoomEvent::VideoState {
                    kind: p.kind,
                    time: p.time,
                    seq: p.seq,
                })
            }
            name::WEBRTC_OFFER => {
                let p: SignalPayload = serde_json::from_value(payload).ok()?;
                Some(RoomEvent::Offer { signal: p.signal })
            }
            name::WEBRTC_ANSWER => {
                let p: SignalPayload = serde_json::from_value(payload).ok()?;
                Some(RoomEvent::Answer { signal: p.signal })
            }
            name::WEBRTC_ICE_CANDIDATE => {
                let p: IceCandidatePayload = serde_json::from_value(payload).ok()?;
                Some(RoomEvent::IceCandidate {
                    candidate: p.candidate,
                    sdp_mid: p.sdp_mid,
                    sdp_mline_index: p.sdp_m_line_index,
                })
            }
            name::EMOJI_REACTION => {
                let p: ReactionPayload = serde_json::from_value(payload).ok()?;
                Some(RoomEvent::Reaction {
                    emoji: p.emoji,
                    placement: p.placement,
                })
            }
            name::PEER_LEFT => {
                let p: PeerLeftPayload = serde_json::from_value(payload).ok()?;
                Some(RoomEvent::PeerLeft {
                    session_id: p.session_id,
                })
            }
            _ => None,
        }
    }

    /// Encode for emission. Chat serializes under `send-message`; the relay
    /// renames it to `receive-message` on delivery.
    pub fn into_frame(self, room_id: &str) -> Frame {
        match self {
            RoomEvent::Chat { sender, text } => Frame::new(
                name::SEND_MESSAGE,
                room_id,
                json!(ChatPayload { sender, text }),
            ),
            RoomEvent::VideoChange { video_id } => Frame::new(
                name::VIDEO_CHANGE,
                room_id,
                json!(VideoChangePayload { video_id }),
            ),
            RoomEvent::VideoState { kind, time, seq } => Frame::new(
                name::VIDEO_STATE,
                room_id,
                json!(VideoStatePayload { kind, time, seq }),
            ),
            RoomEvent::Offer { signal } => {
                Frame::new(name::WEBRTC_OFFER, room_id, json!(SignalPayload { signal }))
            }
            RoomEvent::Answer { signal } => Frame::new(
                name::WEBRTC_ANSWER,
                room_id,
                json!(SignalPayload { signal }),
            ),
            RoomEvent::IceCandidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            } => Frame::new(
                name::WEBRTC_ICE_CANDIDATE,
                room_id,
                json!(IceCandidatePayload {
                    candidate,
                    sdp_mid,
                    sdp_m_line_index: sdp_mline_index,
                }),
            ),
            RoomEvent::Reaction { emoji, placement } => Frame::new(
                name::EMOJI_REACTION,
                room_id,
                json!(ReactionPayload { emoji, placement }),
            ),
            RoomEvent::PeerLeft { session_id } => Frame::new(
                name::PEER_LEFT,
                room_id,
                json!(PeerLeftPayload { session_id }),
            ),
        }
    }
}
