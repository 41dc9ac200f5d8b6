use crate::app_state::SharedState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use uuid::Uuid;

use room_core::events::name;
use room_core::Frame;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    tracing::info!("Client connecting: {}", addr);
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

pub async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: SharedState) {
    let session_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();

    // Everything destined for this session funnels through one channel; a
    // writer task drains it so fan-out from other sessions never blocks on
    // this socket.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => handle_frame(&state, &session_id, &tx, &text),
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Disconnect is unconditional: no drain, no grace period.
    state.remove_session(&session_id);
    writer.abort();
    tracing::info!("Client disconnected: {} ({})", session_id, addr);
}

/// Route one inbound frame. Only the envelope (event name + room id) is
/// interpreted; payloads pass through untouched, malformed or not. The
/// receiving client is the one that must handle them defensively.
fn handle_frame(
    state: &SharedState,
    session_id: &str,
    tx: &mpsc::UnboundedSender<String>,
    text: &str,
) {
    let frame = match Frame::parse(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::debug!("Unroutable frame from {}: {}", session_id, err);
            return;
        }
    };

    match frame.event.as_str() {
        name::JOIN_ROOM => {
            state.join(&frame.room_id, session_id, tx.clone());
        }
        name::SEND_MESSAGE => {
            // Chat is delivered under a different event name, same payload.
            let delivered = Frame::new(name::RECEIVE_MESSAGE, &frame.room_id, frame.payload);
            if let Ok(out) = delivered.to_json() {
                state.forward(&frame.room_id, session_id, &out, false);
            }
        }
        // Media switches echo back to the sender as well.
        name::VIDEO_CHANGE => state.forward(&frame.room_id, session_id, text, true),
        _ => state.forward(&frame.room_id, session_id, text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;

    fn join(state: &SharedState, room: &str, id: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        handle_frame(
            state,
            id,
            &tx,
            &format!(r#"{{"event":"join-room","roomId":"{room}"}}"#),
        );
        rx
    }

    #[tokio::test]
    async fn test_chat_is_renamed_and_not_echoed() {
        let state = AppState::new();
        let (a_tx, mut a) = mpsc::unbounded_channel();
        let mut b = join(&state, "r1", "b");
        handle_frame(&state, "a", &a_tx, r#"{"event":"join-room","roomId":"r1"}"#);

        handle_frame(
            &state,
            "a",
            &a_tx,
            r#"{"event":"send-message","roomId":"r1","sender":"ana","text":"hi"}"#,
        );

        let frame = Frame::parse(&b.recv().await.unwrap()).unwrap();
        assert_eq!(frame.event, "receive-message");
        assert_eq!(frame.payload["sender"], "ana");
        assert_eq!(frame.payload["text"], "hi");
        assert!(a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_video_change_echoes_to_sender() {
        let state = AppState::new();
        let (a_tx, mut a) = mpsc::unbounded_channel();
        let mut b = join(&state, "r1", "b");
        handle_frame(&state, "a", &a_tx, r#"{"event":"join-room","roomId":"r1"}"#);

        let text = r#"{"event":"video-change","roomId":"r1","videoId":"abc123XYZ9"}"#;
        handle_frame(&state, "a", &a_tx, text);
        assert_eq!(a.recv().await.unwrap(), text);
        assert_eq!(b.recv().await.unwrap(), text);
    }

    #[tokio::test]
    async fn test_unknown_events_forward_verbatim_without_echo() {
        let state = AppState::new();
        let (a_tx, mut a) = mpsc::unbounded_channel();
        let mut b = join(&state, "r1", "b");
        handle_frame(&state, "a", &a_tx, r#"{"event":"join-room","roomId":"r1"}"#);

        // Not in the vocabulary; the relay does not care.
        let text = r#"{"event":"whiteboard-stroke","roomId":"r1","points":[1,2]}"#;
        handle_frame(&state, "a", &a_tx, text);
        assert_eq!(b.recv().await.unwrap(), text);
        assert!(a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_garbage_input_is_ignored() {
        let state = AppState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        handle_frame(&state, "a", &tx, "not json at all");
        handle_frame(&state, "a", &tx, r#"{"event":"send-message"}"#);
        assert!(state.rooms.is_empty());
    }

    #[tokio::test]
    async fn test_webrtc_signaling_relays_sender_excluded() {
        let state = AppState::new();
        let (a_tx, mut a) = mpsc::unbounded_channel();
        let mut b = join(&state, "r1", "b");
        handle_frame(&state, "a", &a_tx, r#"{"event":"join-room","roomId":"r1"}"#);

        for event in ["webrtc-offer", "webrtc-answer", "webrtc-ice-candidate"] {
            let text = format!(r#"{{"event":"{event}","roomId":"r1","signal":"sdp"}}"#);
            handle_frame(&state, "a", &a_tx, &text);
            assert_eq!(b.recv().await.unwrap(), text);
        }
        assert!(a.try_recv().is_err());
    }
}
