mod media;
mod rtc;
mod session;
mod storage;
mod sync;

use anyhow::Result;
use clap::Parser;
use rand::Rng;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use room_core::reactions::ReactionBoard;
use room_core::RoomEvent;

use media::MediaToggles;
use rtc::NegotiationEngine;
use session::{RoomSession, SessionUpdate};
use storage::{ChatLine, RoomStore};
use sync::{PlayerCommand, Synchronizer};

#[derive(Debug, Parser)]
#[command(name = "movienight", about = "Watch together: one room, one timeline, two people")]
struct Args {
    /// Relay WebSocket endpoint
    #[arg(long, env = "MOVIENIGHT_SERVER", default_value = "ws://127.0.0.1:3000/ws")]
    server: Url,

    /// Room to join; whoever holds this id is in
    #[arg(long)]
    room: String,

    /// Name shown on your chat messages
    #[arg(long, default_value = "You")]
    name: String,
}

struct Client {
    session: RoomSession,
    synchronizer: Synchronizer,
    engine: NegotiationEngine,
    media: MediaToggles,
    reactions: ReactionBoard,
    store: RoomStore,
    transcript: Vec<ChatLine>,
    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movienight=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let store = RoomStore::at_default_location()?;
    let saved = store.load();
    if let Some(video_id) = &saved.video_id {
        println!("Restored last session: video {}", video_id);
    }

    let (session, mut updates) = RoomSession::connect(&args.server, &args.room).await?;
    let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
    let (pc_state_tx, mut pc_state_rx) = mpsc::unbounded_channel();

    let mut client = Client {
        session,
        synchronizer: Synchronizer::new(saved.video_id),
        engine: NegotiationEngine::new(signal_tx, pc_state_tx),
        media: MediaToggles::default(),
        reactions: ReactionBoard::default(),
        store,
        transcript: saved.transcript,
        name: args.name,
    };

    println!("Joined room {} - type /help for commands", args.room);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !client.handle_line(&line).await? {
                            break;
                        }
                    }
                    None => break,
                }
            }
            update = updates.recv() => {
                match update {
                    Some(update) => {
                        if !client.handle_update(update).await? {
                            break;
                        }
                    }
                    None => break,
                }
            }
            // The engine's outbound signaling rides the same relay session.
            Some(event) = signal_rx.recv() => client.session.send(event)?,
            Some(state) = pc_state_rx.recv() => client.engine.transport_state_changed(state),
        }
    }

    client.engine.close().await;
    Ok(())
}

impl Client {
    /// One line of user input. Returns false to quit.
    async fn handle_line(&mut self, line: &str) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }
        if !line.starts_with('/') {
            self.session.send(RoomEvent::Chat {
                sender: self.name.clone(),
                text: line.to_string(),
            })?;
            self.transcript.push(ChatLine {
                sender: self.name.clone(),
                text: line.to_string(),
            });
            self.persist();
            return Ok(true);
        }

        let (cmd, rest) = match line.split_once(' ') {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };
        match cmd {
            "/video" => match self.synchronizer.select_media(rest) {
                Ok(event) => {
                    self.session.send(event)?;
                    self.persist();
                }
                // Recoverable input problem: nothing was emitted.
                Err(err) => println!("{}", err),
            },
            "/play" => match self.synchronizer.play() {
                Some(event) => {
                    println!("▶ playing");
                    self.session.send(event)?;
                }
                None => println!("No video loaded - /video <url> first"),
            },
            "/pause" => match self.synchronizer.pause() {
                Some(event) => {
                    println!("⏸ paused at {:.1}s", self.synchronizer.state().position);
                    self.session.send(event)?;
                }
                None => println!("No video loaded - /video <url> first"),
            },
            "/seek" => match rest.parse::<f64>() {
                Ok(position) => {
                    if let Some(event) = self.synchronizer.seek(position) {
                        println!("⏩ seeked to {:.1}s", position);
                        self.session.send(event)?;
                    } else {
                        println!("No video loaded - /video <url> first");
                    }
                }
                Err(_) => println!("Usage: /seek <seconds>"),
            },
            "/cam" => {
                let on = self.media.toggle_camera();
                println!("Camera {}", if on { "on" } else { "off" });
                self.renegotiate().await;
            }
            "/mic" => {
                let on = self.media.toggle_mic();
                println!("Mic {}", if on { "on" } else { "off" });
                self.renegotiate().await;
            }
            "/react" => {
                let emoji = if rest.is_empty() { "❤️" } else { rest };
                let placement = rand::thread_rng().gen_range(5.0..95.0);
                self.reactions.push(emoji, placement, Instant::now());
                self.session.send(RoomEvent::Reaction {
                    emoji: emoji.to_string(),
                    placement,
                })?;
            }
            "/status" => {
                let state = self.synchronizer.state();
                match &state.video_id {
                    Some(id) => println!(
                        "Video {} at {:.1}s ({})",
                        id,
                        state.position,
                        if state.playing { "playing" } else { "paused" }
                    ),
                    None => println!("No video loaded"),
                }
                println!(
                    "Camera {} / mic {} / peer link {:?} / room {}",
                    if self.media.camera_on() { "on" } else { "off" },
                    if self.media.mic_on() { "on" } else { "off" },
                    self.engine.phase(),
                    self.session.room_id(),
                );
            }
            "/quit" => return Ok(false),
            _ => {
                println!("Commands: /video <url>  /play  /pause  /seek <s>  /cam  /mic  /react [emoji]  /status  /quit");
                println!("Anything else is chat.");
            }
        }
        Ok(true)
    }

    /// One update from the relay. Returns false when the session is over.
    async fn handle_update(&mut self, update: SessionUpdate) -> Result<bool> {
        let event = match update {
            SessionUpdate::Event(event) => event,
            SessionUpdate::Disconnected => {
                println!("Disconnected from relay.");
                return Ok(false);
            }
        };
        match event {
            RoomEvent::Chat { sender, text } => {
                println!("{}: {}", sender, text);
                self.transcript.push(ChatLine { sender, text });
                self.persist();
            }
            RoomEvent::VideoChange { .. } | RoomEvent::VideoState { .. } => {
                if let Some(command) = self.synchronizer.apply_remote(&event) {
                    self.render(&command);
                    if matches!(command, PlayerCommand::Load(_)) {
                        self.persist();
                    }
                }
            }
            // Negotiation failures are logged per attempt and dropped; the
            // connection itself survives.
            RoomEvent::Offer { signal } => {
                if let Err(err) = self.engine.handle_remote_offer(signal).await {
                    tracing::warn!("Offer handling failed: {:#}", err);
                }
            }
            RoomEvent::Answer { signal } => {
                if let Err(err) = self.engine.handle_remote_answer(signal).await {
                    tracing::warn!("Answer handling failed: {:#}", err);
                }
            }
            RoomEvent::IceCandidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            } => {
                self.engine
                    .handle_remote_candidate(candidate, sdp_mid, sdp_mline_index)
                    .await;
            }
            RoomEvent::Reaction { emoji, placement } => {
                let now = Instant::now();
                self.reactions.push(emoji.clone(), placement, now);
                println!("{}  ({} on screen)", emoji, self.reactions.active(now).len());
            }
            RoomEvent::PeerLeft { session_id } => {
                println!("Peer left the room.");
                tracing::debug!("Session {} departed", session_id);
                self.synchronizer.peer_left();
                self.engine.peer_left().await;
            }
        }
        Ok(true)
    }

    async fn renegotiate(&mut self) {
        if let Err(err) = self.engine.media_changed(self.media.tracks()).await {
            tracing::warn!("Renegotiation failed: {:#}", err);
        }
    }

    fn render(&self, command: &PlayerCommand) {
        match command {
            PlayerCommand::Load(video_id) => println!("Now watching: {}", video_id),
            PlayerCommand::Play { position } => println!("▶ peer pressed play at {:.1}s", position),
            PlayerCommand::Pause { position } => println!("⏸ peer paused at {:.1}s", position),
            PlayerCommand::Seek { position } => println!("⏩ peer seeked to {:.1}s", position),
        }
    }

    // Wholesale overwrite on every change; losing this file only costs the
    // restart recovery.
    fn persist(&self) {
        let state = storage::SavedRoomState {
            video_id: self.synchronizer.state().video_id.clone(),
            transcript: self.transcript.clone(),
        };
        if let Err(err) = self.store.save(&state) {
            tracing::warn!("Could not persist room state: {:#}", err);
        }
    }
}
