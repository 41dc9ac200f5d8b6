use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc_rs::api::interceptor_registry::register_default_interceptors;
use webrtc_rs::api::media_engine::MediaEngine;
use webrtc_rs::api::APIBuilder;
use webrtc_rs::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc_rs::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc_rs::ice_transport::ice_server::RTCIceServer;
use webrtc_rs::interceptor::registry::Registry;
use webrtc_rs::peer_connection::configuration::RTCConfiguration;
use webrtc_rs::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc_rs::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc_rs::peer_connection::RTCPeerConnection;
use webrtc_rs::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc_rs::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc_rs::track::track_local::TrackLocal;

/// Where the signaling for this peer connection stands. `Connected` means
/// the description exchange has settled; ICE keeps trickling on its own
/// and may finish before or after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    Idle,
    OfferSent,
    AnswerSent,
    Connected,
    Closed,
}

/// The signaling state machine, kept free of any transport so the
/// transitions can be exercised directly. `C` is whatever the caller
/// buffers for candidates that arrive before a remote description.
#[derive(Debug)]
pub struct Negotiation<C> {
    phase: NegotiationPhase,
    dirty: bool,
    remote_set: bool,
    pending: Vec<C>,
}

impl<C> Default for Negotiation<C> {
    fn default() -> Self {
        Self {
            phase: NegotiationPhase::Idle,
            dirty: false,
            remote_set: false,
            pending: Vec::new(),
        }
    }
}

impl<C> Negotiation<C> {
    pub fn phase(&self) -> NegotiationPhase {
        self.phase
    }

    /// Try to start an offer round. While one is already in flight the
    /// round is marked dirty instead: the caller re-offers with the final
    /// state once the in-flight round settles (latest-wins).
    pub fn begin_offer(&mut self) -> bool {
        match self.phase {
            NegotiationPhase::OfferSent => {
                self.dirty = true;
                false
            }
            _ => {
                self.phase = NegotiationPhase::OfferSent;
                true
            }
        }
    }

    pub fn answer_sent(&mut self) {
        self.phase = NegotiationPhase::AnswerSent;
    }

    pub fn remote_description_set(&mut self) {
        self.remote_set = true;
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_set
    }

    /// The answer to our offer has been applied: the exchange is settled.
    /// Returns true when a toggle landed mid-round and a fresh offer is
    /// owed.
    pub fn remote_answer_applied(&mut self) -> bool {
        self.phase = NegotiationPhase::Connected;
        std::mem::take(&mut self.dirty)
    }

    /// The underlying transport reports connected (callee path reaches
    /// `Connected` through here).
    pub fn transport_connected(&mut self) {
        if self.phase != NegotiationPhase::Closed {
            self.phase = NegotiationPhase::Connected;
        }
    }

    /// A round that errored out is abandoned; the next toggle starts over.
    pub fn round_failed(&mut self) {
        if matches!(
            self.phase,
            NegotiationPhase::OfferSent | NegotiationPhase::AnswerSent
        ) {
            self.phase = NegotiationPhase::Idle;
        }
    }

    pub fn buffer_candidate(&mut self, candidate: C) {
        self.pending.push(candidate);
    }

    pub fn drain_candidates(&mut self) -> Vec<C> {
        std::mem::take(&mut self.pending)
    }

    pub fn close(&mut self) {
        self.phase = NegotiationPhase::Closed;
        self.dirty = false;
        self.remote_set = false;
        self.pending.clear();
    }
}

/// Manages the one peer-to-peer A/V link a room session has. The relay is
/// used purely as a signaling channel: outbound offers/answers/candidates
/// leave through `signals`, transport state changes come back to the
/// caller's loop through `transport_events`.
pub struct NegotiationEngine {
    machine: Negotiation<RTCIceCandidateInit>,
    pc: Option<Arc<RTCPeerConnection>>,
    track_senders: Vec<Arc<RTCRtpSender>>,
    desired_tracks: Vec<Arc<TrackLocalStaticSample>>,
    signals: mpsc::UnboundedSender<room_core::RoomEvent>,
    transport_events: mpsc::UnboundedSender<RTCPeerConnectionState>,
}

impl NegotiationEngine {
    pub fn new(
        signals: mpsc::UnboundedSender<room_core::RoomEvent>,
        transport_events: mpsc::UnboundedSender<RTCPeerConnectionState>,
    ) -> Self {
        Self {
            machine: Negotiation::default(),
            pc: None,
            track_senders: Vec::new(),
            desired_tracks: Vec::new(),
            signals,
            transport_events,
        }
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.machine.phase()
    }

    /// The local track set changed (camera or mic toggled): remember the
    /// new set and re-run the full offer path with it. Every toggle is a
    /// complete renegotiation round, not an incremental update.
    pub async fn media_changed(
        &mut self,
        tracks: Vec<Arc<TrackLocalStaticSample>>,
    ) -> Result<()> {
        self.desired_tracks = tracks;
        self.renegotiate().await
    }

    async fn renegotiate(&mut self) -> Result<()> {
        if !self.machine.begin_offer() {
            debug!("Offer already in flight; latest track set queued");
            return Ok(());
        }
        if let Err(err) = self.offer_round().await {
            self.machine.round_failed();
            return Err(err);
        }
        Ok(())
    }

    async fn offer_round(&mut self) -> Result<()> {
        let pc = self.ensure_connection().await?;
        self.attach_desired_tracks(&pc).await?;

        let offer = pc.create_offer(None).await.context("create offer")?;
        pc.set_local_description(offer.clone())
            .await
            .context("apply local offer")?;
        let _ = self.signals.send(room_core::RoomEvent::Offer { signal: offer.sdp });
        info!("Offer sent");
        Ok(())
    }

    /// Callee path: apply the remote offer, answer it, apply the answer
    /// locally, and relay it back, all before any further negotiation
    /// event for this connection is processed.
    pub async fn handle_remote_offer(&mut self, sdp: String) -> Result<()> {
        if self.machine.phase() == NegotiationPhase::OfferSent {
            // Both sides offered at once; last writer wins, same as the
            // rest of the protocol.
            debug!("Remote offer while ours is in flight; answering theirs");
        }
        let result = self.answer_round(sdp).await;
        if result.is_err() {
            self.machine.round_failed();
        }
        result
    }

    async fn answer_round(&mut self, sdp: String) -> Result<()> {
        let pc = self.ensure_connection().await?;

        let offer = RTCSessionDescription::offer(sdp).context("parse remote offer")?;
        pc.set_remote_description(offer)
            .await
            .context("apply remote offer")?;
        self.machine.remote_description_set();
        self.flush_pending_candidates(&pc).await;

        // Our media rides back on the same round.
        self.attach_desired_tracks(&pc).await?;

        let answer = pc.create_answer(None).await.context("create answer")?;
        pc.set_local_description(answer.clone())
            .await
            .context("apply local answer")?;
        let _ = self
            .signals
            .send(room_core::RoomEvent::Answer { signal: answer.sdp });
        self.machine.answer_sent();
        info!("Answer sent");
        Ok(())
    }

    /// Caller path completion. An answer with no connection to apply it to
    /// is an anomaly worth a log line, nothing more.
    pub async fn handle_remote_answer(&mut self, sdp: String) -> Result<()> {
        let Some(pc) = self.pc.clone() else {
            warn!("Answer received with no active peer connection; ignoring");
            return Ok(());
        };
        let answer = RTCSessionDescription::answer(sdp).context("parse remote answer")?;
        pc.set_remote_description(answer)
            .await
            .context("apply remote answer")?;
        self.machine.remote_description_set();
        self.flush_pending_candidates(&pc).await;

        if self.machine.remote_answer_applied() {
            info!("Track set changed mid-round; renegotiating");
            self.renegotiate().await?;
        }
        Ok(())
    }

    /// Candidates may arrive before the remote description; they are
    /// buffered until it lands. A single candidate that fails to add is
    /// logged and dropped, never fatal to the connection.
    pub async fn handle_remote_candidate(
        &mut self,
        candidate: String,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u16>,
    ) {
        let init = RTCIceCandidateInit {
            candidate,
            sdp_mid,
            sdp_mline_index,
            username_fragment: None,
        };
        match &self.pc {
            Some(pc) if self.machine.has_remote_description() => {
                if let Err(err) = pc.add_ice_candidate(init).await {
                    warn!("Failed to add ICE candidate: {}", err);
                }
            }
            _ => {
                debug!("Buffering early ICE candidate");
                self.machine.buffer_candidate(init);
            }
        }
    }

    /// Transport state updates surfaced by the caller's loop.
    pub fn transport_state_changed(&mut self, state: RTCPeerConnectionState) {
        match state {
            RTCPeerConnectionState::Connected => {
                info!("Peer link connected");
                self.machine.transport_connected();
            }
            RTCPeerConnectionState::Disconnected | RTCPeerConnectionState::Failed => {
                warn!("Peer link lost ({:?})", state);
            }
            other => debug!("Peer link state: {:?}", other),
        }
    }

    /// The peer is gone; drop the link and stand ready for a new round.
    pub async fn peer_left(&mut self) {
        self.teardown().await;
        self.machine = Negotiation::default();
    }

    /// Local teardown.
    pub async fn close(&mut self) {
        self.teardown().await;
        self.machine.close();
    }

    async fn teardown(&mut self) {
        self.track_senders.clear();
        if let Some(pc) = self.pc.take() {
            if let Err(err) = pc.close().await {
                warn!("Error closing peer connection: {}", err);
            }
        }
    }

    async fn attach_desired_tracks(&mut self, pc: &Arc<RTCPeerConnection>) -> Result<()> {
        for sender in self.track_senders.drain(..) {
            if let Err(err) = pc.remove_track(&sender).await {
                warn!("Failed to detach outbound track: {}", err);
            }
        }
        for track in &self.desired_tracks {
            let sender = pc
                .add_track(track.clone() as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .context("attach local track")?;
            self.track_senders.push(sender);
        }
        Ok(())
    }

    async fn flush_pending_candidates(&mut self, pc: &Arc<RTCPeerConnection>) {
        for init in self.machine.drain_candidates() {
            if let Err(err) = pc.add_ice_candidate(init).await {
                warn!("Failed to add buffered ICE candidate: {}", err);
            }
        }
    }

    async fn ensure_connection(&mut self) -> Result<Arc<RTCPeerConnection>> {
        if let Some(pc) = &self.pc {
            return Ok(pc.clone());
        }

        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: vec![
                    "stun:stun.l.google.com:19302".to_string(),
                    "stun:stun1.l.google.com:19302".to_string(),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        let pc = Arc::new(
            api.new_peer_connection(config)
                .await
                .context("create peer connection")?,
        );

        // Trickle local candidates to the peer as they surface.
        let signals = self.signals.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let signals = signals.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                match candidate.to_json() {
                    Ok(init) => {
                        let _ = signals.send(room_core::RoomEvent::IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                        });
                    }
                    Err(err) => warn!("Could not serialize ICE candidate: {}", err),
                }
            })
        }));

        let transport_events = self.transport_events.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let transport_events = transport_events.clone();
            Box::pin(async move {
                let _ = transport_events.send(state);
            })
        }));

        self.pc = Some(pc.clone());
        Ok(pc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_reaches_connected_without_any_ice() {
        let mut caller: Negotiation<String> = Negotiation::default();
        let mut callee: Negotiation<String> = Negotiation::default();

        assert!(caller.begin_offer());
        assert_eq!(caller.phase(), NegotiationPhase::OfferSent);

        // Callee applies the offer and answers.
        callee.remote_description_set();
        callee.answer_sent();
        assert_eq!(callee.phase(), NegotiationPhase::AnswerSent);

        // Caller applies the answer: settled, no candidate exchanged yet.
        caller.remote_description_set();
        assert!(!caller.remote_answer_applied());
        assert_eq!(caller.phase(), NegotiationPhase::Connected);
    }

    #[test]
    fn test_callee_connects_when_transport_does() {
        let mut callee: Negotiation<String> = Negotiation::default();
        callee.remote_description_set();
        callee.answer_sent();
        callee.transport_connected();
        assert_eq!(callee.phase(), NegotiationPhase::Connected);
    }

    #[test]
    fn test_double_toggle_queues_one_fresh_round() {
        let mut machine: Negotiation<String> = Negotiation::default();
        assert!(machine.begin_offer());
        // Second toggle while the offer is in flight: no concurrent offer.
        assert!(!machine.begin_offer());
        assert!(!machine.begin_offer());
        assert_eq!(machine.phase(), NegotiationPhase::OfferSent);

        // Round settles owing exactly one re-offer.
        machine.remote_description_set();
        assert!(machine.remote_answer_applied());
        assert!(machine.begin_offer());
        machine.remote_description_set();
        assert!(!machine.remote_answer_applied());
    }

    #[test]
    fn test_candidates_buffer_until_remote_description() {
        let mut machine: Negotiation<&str> = Negotiation::default();
        assert!(!machine.has_remote_description());
        machine.buffer_candidate("a");
        machine.buffer_candidate("b");

        machine.remote_description_set();
        assert_eq!(machine.drain_candidates(), vec!["a", "b"]);
        assert!(machine.drain_candidates().is_empty());
    }

    #[test]
    fn test_renegotiation_restarts_from_connected() {
        let mut machine: Negotiation<String> = Negotiation::default();
        assert!(machine.begin_offer());
        machine.remote_description_set();
        machine.remote_answer_applied();

        // toggleMedia during an active connection re-runs the offer path.
        assert!(machine.begin_offer());
        assert_eq!(machine.phase(), NegotiationPhase::OfferSent);
    }

    #[test]
    fn test_close_is_reachable_from_any_state() {
        let setups: [fn(&mut Negotiation<String>); 4] = [
            |_| {},
            |m| {
                m.begin_offer();
            },
            |m| {
                m.remote_description_set();
                m.answer_sent();
            },
            |m| {
                m.begin_offer();
                m.remote_description_set();
                m.remote_answer_applied();
            },
        ];
        for setup in setups {
            let mut machine = Negotiation::default();
            setup(&mut machine);
            machine.close();
            assert_eq!(machine.phase(), NegotiationPhase::Closed);
            // A closed machine never resurrects through transport noise.
            machine.transport_connected();
            assert_eq!(machine.phase(), NegotiationPhase::Closed);
        }
    }

    #[test]
    fn test_failed_round_returns_to_idle() {
        let mut machine: Negotiation<String> = Negotiation::default();
        assert!(machine.begin_offer());
        machine.round_failed();
        assert_eq!(machine.phase(), NegotiationPhase::Idle);
        // The next toggle simply starts over.
        assert!(machine.begin_offer());
    }
}
