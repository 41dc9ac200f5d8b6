use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The one shape every message on the signaling transport has: a named
/// event scoped to a room, with whatever else the sender attached riding
/// along uninterpreted. The relay deserializes only `event` and `roomId`;
/// the rest stays an opaque JSON map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(flatten)]
    pub payload: Value,
}

impl Frame {
    /// `payload` must serialize as a JSON object (use `json!({})` for none).
    pub fn new(event: impl Into<String>, room_id: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            room_id: room_id.into(),
            payload,
        }
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roundtrip_keeps_unknown_fields() {
        let text = r#"{"event":"video-state","roomId":"r1","type":"play","time":42.0,"seq":3}"#;
        let frame = Frame::parse(text).unwrap();
        assert_eq!(frame.event, "video-state");
        assert_eq!(frame.room_id, "r1");
        assert_eq!(frame.payload["type"], "play");
        assert_eq!(frame.payload["seq"], 3);

        let reencoded = frame.to_json().unwrap();
        let reparsed = Frame::parse(&reencoded).unwrap();
        assert_eq!(reparsed.payload["time"], 42.0);
    }

    #[test]
    fn test_empty_payload() {
        let frame = Frame::new("join-room", "r1", json!({}));
        let text = frame.to_json().unwrap();
        let parsed = Frame::parse(&text).unwrap();
        assert_eq!(parsed.event, "join-room");
        assert_eq!(parsed.room_id, "r1");
    }

    #[test]
    fn test_missing_room_id_is_an_error() {
        assert!(Frame::parse(r#"{"event":"send-message"}"#).is_err());
        assert!(Frame::parse("not json").is_err());
    }
}
