use anyhow::anyhow;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use room_core::events::name;
use room_core::{Frame, RoomEvent};

/// What the read side of the transport hands to the application loop.
#[derive(Debug)]
pub enum SessionUpdate {
    Event(RoomEvent),
    Disconnected,
}

/// One live connection to the relay, scoped to one room. The transport is
/// owned by the session object (constructed explicitly, never a
/// process-wide global) so teardown is just dropping it.
pub struct RoomSession {
    room_id: String,
    outbound: mpsc::UnboundedSender<String>,
}

impl RoomSession {
    /// Connect, join the room, and spawn the writer/reader tasks. Returns
    /// the session handle and the stream of updates for the caller's loop.
    pub async fn connect(
        server: &Url,
        room_id: &str,
    ) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<SessionUpdate>)> {
        let (ws_stream, _) = connect_async(server.as_str()).await?;
        tracing::info!("Connected to {}", server);
        let (mut write, mut read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if write.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        let (update_tx, update_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(err) => {
                        tracing::warn!("Transport error: {}", err);
                        break;
                    }
                };
                let text = match &msg {
                    Message::Text(text) => text.as_str(),
                    Message::Close(_) => break,
                    _ => continue,
                };
                // Anything that does not decode is dropped here, never a
                // crash: the relay forwards payloads unvalidated.
                match Frame::parse(text) {
                    Ok(frame) => match RoomEvent::from_frame(&frame) {
                        Some(event) => {
                            if update_tx.send(SessionUpdate::Event(event)).is_err() {
                                break;
                            }
                        }
                        None => tracing::debug!("Dropping undecodable event: {}", frame.event),
                    },
                    Err(err) => tracing::debug!("Dropping unparseable frame: {}", err),
                }
            }
            let _ = update_tx.send(SessionUpdate::Disconnected);
        });

        let session = Self {
            room_id: room_id.to_string(),
            outbound: out_tx,
        };
        session.send_frame(Frame::new(name::JOIN_ROOM, room_id, serde_json::json!({})))?;
        Ok((session, update_rx))
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Fire-and-forget emission into the room.
    pub fn send(&self, event: RoomEvent) -> anyhow::Result<()> {
        self.send_frame(event.into_frame(&self.room_id))
    }

    fn send_frame(&self, frame: Frame) -> anyhow::Result<()> {
        let text = frame.to_json()?;
        self.outbound
            .send(text)
            .map_err(|_| anyhow!("transport closed"))
    }
}
