use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::SharedState;
use room_core::Frame;

/// Body of the out-of-band push ingress: an external collaborator fires a
/// named event into a room without holding a live transport session.
#[derive(Debug, Deserialize)]
pub struct PushRequest {
    pub event: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(default)]
    pub data: Value,
}

/// `POST /push`: unauthenticated, at-most-once, no acknowledgment beyond
/// the HTTP status. The event enters the same room-scoped fan-out as
/// transport frames; with no sender inside the room, every member gets it.
pub async fn handle_push(
    State(state): State<SharedState>,
    Json(req): Json<PushRequest>,
) -> impl IntoResponse {
    let payload = match req.data {
        Value::Null => json!({}),
        other => other,
    };
    let frame = Frame::new(&req.event, &req.room_id, payload);
    match frame.to_json() {
        Ok(text) => {
            state.broadcast(&req.room_id, &text);
            (StatusCode::OK, Json(json!({ "success": true })))
        }
        Err(err) => {
            tracing::error!("Push payload not serializable: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false })),
            )
        }
    }
}
