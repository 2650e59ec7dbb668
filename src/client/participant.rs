use tracing::{debug, info, instrument, warn};

use super::connector::PeerConnector;
use super::peer::PeerLinks;
use super::reconciler::Reconciler;
use super::scene::Scene;
use crate::broadcast::Gate;
use crate::presence::PresenceSnapshot;
use crate::signaling::{IceCandidate, SdpKind, SessionDescription, SessionState};
use crate::user::{Pose, User, UserId};
use crate::websockets::messages::{
    AddPeerPayload, IceCandidatePayload, RemovePeerPayload, RemoveUserPayload,
    SessionDescriptionPayload,
};
use crate::websockets::{MessageType, WebSocketMessage};

/// Client half of the protocol for one participant
///
/// Feed it every frame from the relay through `handle` and send back whatever
/// it returns. Local events (frame ticks, ICE gathering, connection state)
/// come in through the `on_*` and `pose_tick` methods.
pub struct Participant<S: Scene, C: PeerConnector> {
    scene: S,
    connector: C,
    room: String,
    user: Option<User>,
    reconciler: Reconciler,
    links: Option<PeerLinks>,
    tick_gate: Gate,
    ready_signaled: bool,
    audio_open: bool,
}

impl<S: Scene, C: PeerConnector> Participant<S, C> {
    pub fn new(scene: S, connector: C, room: impl Into<String>) -> Self {
        Self {
            scene,
            connector,
            room: room.into(),
            user: None,
            reconciler: Reconciler::new(),
            links: None,
            tick_gate: Gate::closed(),
            ready_signaled: false,
            audio_open: false,
        }
    }

    pub fn id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|user| &user.id)
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn is_ticking(&self) -> bool {
        self.tick_gate.is_open()
    }

    pub fn peer_state(&self, peer: &UserId) -> Option<SessionState> {
        self.links.as_ref()?.state(peer)
    }

    /// Transport is up: ask to join the configured room
    pub fn on_connected(&mut self) -> Vec<WebSocketMessage> {
        self.reconciler.set_room(self.room.clone());
        vec![WebSocketMessage::join_room(self.room.clone())]
    }

    /// Moves to another room. Links and avatars of the old room are dropped
    /// straight away; the relay sends the new room's state after the join.
    pub async fn change_room(&mut self, room: impl Into<String>) -> Vec<WebSocketMessage> {
        let room = room.into();
        if room == self.room {
            return Vec::new();
        }

        self.close_all_peers().await;
        self.reconciler.clear(&mut self.scene);
        self.reconciler.set_room(room.clone());
        self.room = room.clone();

        vec![WebSocketMessage::join_room(room)]
    }

    /// Current pose as a tick, once the relay has said to start ticking
    pub fn pose_tick(&self, pose: Pose) -> Option<WebSocketMessage> {
        if !self.tick_gate.is_open() {
            return None;
        }
        let id = self.id()?.clone();
        Some(WebSocketMessage::tick(id, pose.position, pose.rotation))
    }

    /// A locally gathered ICE candidate for `peer`
    pub fn on_local_candidate(
        &mut self,
        peer: &UserId,
        candidate: IceCandidate,
    ) -> Option<WebSocketMessage> {
        match self.links.as_mut()?.local_candidate(peer) {
            Ok(_) => Some(WebSocketMessage::ice_candidate(peer.clone(), candidate)),
            Err(e) => {
                debug!(peer_id = %peer, error = %e, "Dropping local candidate");
                None
            }
        }
    }

    /// The peer connection to `peer` reported connected
    pub fn on_peer_connected(&mut self, peer: &UserId) -> bool {
        let Some(links) = self.links.as_mut() else {
            return false;
        };
        match links.mark_connected(peer) {
            Ok(_) => {
                self.scene.attach_peer_audio(peer);
                info!(peer_id = %peer, "Peer audio link established");
                true
            }
            Err(e) => {
                warn!(peer_id = %peer, error = %e, "Ignoring connected report");
                false
            }
        }
    }

    /// The relay connection dropped without a disconnect message
    pub async fn on_transport_closed(&mut self) {
        self.teardown().await;
    }

    /// Dispatches one frame from the relay. Returns frames to send back.
    #[instrument(skip(self, message), fields(message_type = ?message.message_type))]
    pub async fn handle(&mut self, message: WebSocketMessage) -> Vec<WebSocketMessage> {
        let outbound = match message.message_type {
            MessageType::CreateUser => self.on_create_user(&message),
            MessageType::GetOthersCallback => self.on_initial_others(&message),
            MessageType::StartTick => {
                self.tick_gate.open();
                Ok(Vec::new())
            }
            MessageType::UsersUpdated => self.on_snapshot(&message),
            MessageType::RemoveUser => self.on_remove_user(&message),
            MessageType::InitWebRtc => {
                self.open_audio().await;
                Ok(Vec::new())
            }
            MessageType::AddPeer => self.on_add_peer(&message).await,
            MessageType::RemovePeer => self.on_remove_peer(&message).await,
            MessageType::SessionDescription => self.on_session_description(&message).await,
            MessageType::IceCandidate => self.on_ice_candidate(&message).await,
            MessageType::Disconnect => {
                self.teardown().await;
                Ok(Vec::new())
            }
            other => {
                debug!(message_type = ?other, "Ignoring client-bound frame of server type");
                Ok(Vec::new())
            }
        };

        outbound.unwrap_or_else(|e| {
            warn!(error = %e, "Dropping malformed relay message");
            Vec::new()
        })
    }

    fn on_create_user(
        &mut self,
        message: &WebSocketMessage,
    ) -> Result<Vec<WebSocketMessage>, serde_json::Error> {
        let user: User = message.payload_as()?;

        let fresh = self.links.as_ref().map(PeerLinks::own_id) != Some(&user.id);
        if fresh {
            self.links = Some(PeerLinks::new(user.id.clone()));
        }
        self.reconciler.set_identity(user.id.clone());
        self.reconciler.set_room(user.room.clone());
        self.room = user.room.clone();
        self.scene.attach_first_person(&user);
        self.user = Some(user);

        self.tick_gate.prime();
        Ok(vec![WebSocketMessage::bare(MessageType::GetOthers)])
    }

    fn on_initial_others(
        &mut self,
        message: &WebSocketMessage,
    ) -> Result<Vec<WebSocketMessage>, serde_json::Error> {
        self.on_snapshot(message)?;

        if self.ready_signaled {
            return Ok(Vec::new());
        }
        self.ready_signaled = true;
        Ok(vec![WebSocketMessage::bare(MessageType::HaveGottenOthers)])
    }

    fn on_snapshot(
        &mut self,
        message: &WebSocketMessage,
    ) -> Result<Vec<WebSocketMessage>, serde_json::Error> {
        let snapshot: PresenceSnapshot = message.payload_as()?;
        self.reconciler.apply(&snapshot, &mut self.scene);
        Ok(Vec::new())
    }

    fn on_remove_user(
        &mut self,
        message: &WebSocketMessage,
    ) -> Result<Vec<WebSocketMessage>, serde_json::Error> {
        let RemoveUserPayload { user_id } = message.payload_as()?;
        self.reconciler.remove(&user_id, &mut self.scene);
        Ok(Vec::new())
    }

    async fn open_audio(&mut self) {
        if self.audio_open {
            return;
        }
        match self.connector.open_local_audio().await {
            Ok(()) => self.audio_open = true,
            Err(e) => warn!(error = %e, "Voice chat unavailable"),
        }
    }

    async fn on_add_peer(
        &mut self,
        message: &WebSocketMessage,
    ) -> Result<Vec<WebSocketMessage>, serde_json::Error> {
        let AddPeerPayload {
            peer_id,
            create_offer,
        } = message.payload_as()?;

        let Some(links) = self.links.as_mut() else {
            debug!(peer_id = %peer_id, "addPeer before createUser");
            return Ok(Vec::new());
        };
        links.add(&peer_id);

        if !create_offer {
            return Ok(Vec::new());
        }

        let offer = match self.connector.create_offer(&peer_id).await {
            Ok(offer) => offer,
            Err(e) => {
                warn!(peer_id = %peer_id, error = %e, "Failed to create offer");
                return Ok(Vec::new());
            }
        };

        match self.links.as_mut().map(|links| links.local_offer(&peer_id)) {
            Some(Ok(_)) => Ok(vec![WebSocketMessage::session_description(peer_id, offer)]),
            _ => Ok(Vec::new()),
        }
    }

    async fn on_remove_peer(
        &mut self,
        message: &WebSocketMessage,
    ) -> Result<Vec<WebSocketMessage>, serde_json::Error> {
        let RemovePeerPayload { peer_id } = message.payload_as()?;
        self.close_peer(&peer_id).await;
        Ok(Vec::new())
    }

    async fn on_session_description(
        &mut self,
        message: &WebSocketMessage,
    ) -> Result<Vec<WebSocketMessage>, serde_json::Error> {
        let SessionDescriptionPayload {
            peer_id,
            description,
        } = message.payload_as()?;

        let Some(links) = self.links.as_mut() else {
            return Ok(Vec::new());
        };

        let accepted = match description.kind {
            SdpKind::Offer => links.remote_offer(&peer_id),
            SdpKind::Answer => links.remote_answer(&peer_id),
        };
        if let Err(e) = accepted {
            debug!(peer_id = %peer_id, error = %e, "Dropping stale session description");
            return Ok(Vec::new());
        }

        let mut outbound = Vec::new();
        match description.kind {
            SdpKind::Offer => {
                if let Some(answer) = self.answer(&peer_id, description).await {
                    outbound.push(WebSocketMessage::session_description(
                        peer_id.clone(),
                        answer,
                    ));
                }
            }
            SdpKind::Answer => {
                if let Err(e) = self.connector.accept_answer(&peer_id, description).await {
                    warn!(peer_id = %peer_id, error = %e, "Failed to apply answer");
                }
            }
        }

        self.flush_pending(&peer_id).await;
        Ok(outbound)
    }

    async fn answer(
        &mut self,
        peer_id: &UserId,
        offer: SessionDescription,
    ) -> Option<SessionDescription> {
        let answer = match self.connector.accept_offer(peer_id, offer).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(peer_id = %peer_id, error = %e, "Failed to answer offer");
                return None;
            }
        };

        match self.links.as_mut()?.local_answer(peer_id) {
            Ok(_) => Some(answer),
            Err(e) => {
                debug!(peer_id = %peer_id, error = %e, "Answer no longer applicable");
                None
            }
        }
    }

    async fn on_ice_candidate(
        &mut self,
        message: &WebSocketMessage,
    ) -> Result<Vec<WebSocketMessage>, serde_json::Error> {
        let IceCandidatePayload { peer_id, candidate } = message.payload_as()?;

        let Some(links) = self.links.as_mut() else {
            return Ok(Vec::new());
        };

        match links.remote_candidate(&peer_id, candidate) {
            Ok(Some(candidate)) => self.add_candidate(&peer_id, candidate).await,
            Ok(None) => {}
            Err(e) => debug!(peer_id = %peer_id, error = %e, "Dropping stale candidate"),
        }
        Ok(Vec::new())
    }

    async fn add_candidate(&mut self, peer_id: &UserId, candidate: IceCandidate) {
        if let Err(e) = self.connector.add_ice_candidate(peer_id, candidate).await {
            warn!(peer_id = %peer_id, error = %e, "Failed to add ICE candidate");
        }
    }

    async fn flush_pending(&mut self, peer_id: &UserId) {
        let pending = match self.links.as_mut() {
            Some(links) => links.take_pending(peer_id),
            None => return,
        };
        for candidate in pending {
            self.add_candidate(peer_id, candidate).await;
        }
    }

    async fn close_peer(&mut self, peer_id: &UserId) {
        let closed = self
            .links
            .as_mut()
            .map(|links| links.close(peer_id))
            .unwrap_or(false);
        if closed {
            self.connector.close_peer(peer_id).await;
            self.scene.detach_peer_audio(peer_id);
            info!(peer_id = %peer_id, "Closed peer audio link");
        }
    }

    async fn close_all_peers(&mut self) {
        let peers = self
            .links
            .as_mut()
            .map(PeerLinks::close_all)
            .unwrap_or_default();
        for peer_id in peers {
            self.connector.close_peer(&peer_id).await;
            self.scene.detach_peer_audio(&peer_id);
        }
    }

    async fn teardown(&mut self) {
        self.close_all_peers().await;
        self.reconciler.clear(&mut self.scene);
        if self.audio_open {
            self.connector.close_local_audio().await;
            self.audio_open = false;
        }
        info!(user_id = ?self.id(), "Participant torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{RecordingConnector, RecordingScene};
    use crate::presence::PresenceSnapshot;
    use crate::user::Vec3;

    type TestParticipant = Participant<RecordingScene, RecordingConnector>;

    fn participant() -> TestParticipant {
        Participant::new(
            RecordingScene::default(),
            RecordingConnector::default(),
            "lobby",
        )
    }

    fn me() -> UserId {
        UserId::from("me")
    }

    fn peer() -> UserId {
        UserId::from("peer")
    }

    async fn joined() -> TestParticipant {
        let mut p = participant();
        p.on_connected();
        let user = User::new(me(), "lobby", Pose::default());
        p.handle(WebSocketMessage::create_user(&user)).await;
        p.handle(WebSocketMessage::bare(MessageType::InitWebRtc))
            .await;
        p
    }

    fn types(messages: &[WebSocketMessage]) -> Vec<MessageType> {
        messages.iter().map(|m| m.message_type).collect()
    }

    #[tokio::test]
    async fn test_handshake_sequence() {
        let mut p = participant();

        assert_eq!(types(&p.on_connected()), vec![MessageType::JoinRoom]);

        let user = User::new(me(), "lobby", Pose::default());
        let out = p.handle(WebSocketMessage::create_user(&user)).await;
        assert_eq!(types(&out), vec![MessageType::GetOthers]);
        assert_eq!(p.scene().first_person, Some(me()));

        let others = p
            .handle(WebSocketMessage::get_others_callback(
                &PresenceSnapshot::empty("lobby"),
            ))
            .await;
        assert_eq!(types(&others), vec![MessageType::HaveGottenOthers]);

        // No ticks until the relay says so
        assert!(p.pose_tick(Pose::default()).is_none());
        p.handle(WebSocketMessage::bare(MessageType::StartTick))
            .await;
        let tick = p
            .pose_tick(Pose::new(Vec3::new(1.0, 2.0, 3.0), Vec3::default()))
            .unwrap();
        assert_eq!(tick.message_type, MessageType::Tick);
        assert_eq!(tick.payload["id"], "me");
    }

    #[tokio::test]
    async fn test_ready_is_signaled_once() {
        let mut p = joined().await;
        let snapshot = WebSocketMessage::get_others_callback(&PresenceSnapshot::empty("lobby"));

        assert_eq!(p.handle(snapshot.clone()).await.len(), 1);
        assert!(p.handle(snapshot).await.is_empty());
    }

    #[tokio::test]
    async fn test_start_tick_before_identity_is_ignored() {
        let mut p = participant();
        p.on_connected();

        p.handle(WebSocketMessage::bare(MessageType::StartTick))
            .await;
        assert!(!p.is_ticking());

        let user = User::new(me(), "lobby", Pose::default());
        p.handle(WebSocketMessage::create_user(&user)).await;
        p.handle(WebSocketMessage::bare(MessageType::StartTick))
            .await;
        assert!(p.is_ticking());
    }

    #[tokio::test]
    async fn test_offerer_flow() {
        let mut p = joined().await;

        let out = p.handle(WebSocketMessage::add_peer(peer(), true)).await;
        assert_eq!(types(&out), vec![MessageType::SessionDescription]);
        assert_eq!(out[0].payload["peer_id"], "peer");
        assert_eq!(out[0].payload["description"]["type"], "offer");
        assert_eq!(p.peer_state(&peer()), Some(SessionState::Offered));

        let candidate = p.on_local_candidate(&peer(), IceCandidate::new("local"));
        assert!(candidate.is_some());

        p.handle(WebSocketMessage::session_description(
            peer(),
            SessionDescription::new(SdpKind::Answer, "answer"),
        ))
        .await;
        p.handle(WebSocketMessage::ice_candidate(
            peer(),
            IceCandidate::new("remote"),
        ))
        .await;

        assert!(p.on_peer_connected(&peer()));
        assert_eq!(p.peer_state(&peer()), Some(SessionState::Established));
        assert_eq!(p.connector().remote_candidates(&peer()), vec!["remote"]);
        assert!(p.scene().peer_audio.contains(&peer()));
    }

    #[tokio::test]
    async fn test_answerer_replays_early_candidates() {
        let mut p = joined().await;
        p.handle(WebSocketMessage::add_peer(peer(), false)).await;

        // Candidate overtakes the offer it belongs to
        p.handle(WebSocketMessage::ice_candidate(
            peer(),
            IceCandidate::new("early"),
        ))
        .await;
        assert!(p.connector().remote_candidates(&peer()).is_empty());

        let out = p
            .handle(WebSocketMessage::session_description(
                peer(),
                SessionDescription::new(SdpKind::Offer, "offer"),
            ))
            .await;

        assert_eq!(types(&out), vec![MessageType::SessionDescription]);
        assert_eq!(out[0].payload["description"]["type"], "answer");
        assert_eq!(p.connector().remote_candidates(&peer()), vec!["early"]);
    }

    #[tokio::test]
    async fn test_connected_before_answer_is_ignored() {
        let mut p = joined().await;
        p.handle(WebSocketMessage::add_peer(peer(), true)).await;

        assert!(!p.on_peer_connected(&peer()));
        assert_eq!(p.peer_state(&peer()), Some(SessionState::Offered));
    }

    #[tokio::test]
    async fn test_remove_peer_closes_and_drops_late_answer() {
        let mut p = joined().await;
        p.handle(WebSocketMessage::add_peer(peer(), true)).await;

        p.handle(WebSocketMessage::remove_peer(peer())).await;
        assert_eq!(p.peer_state(&peer()), Some(SessionState::Closed));
        assert_eq!(p.connector().closed, vec![peer()]);

        p.handle(WebSocketMessage::session_description(
            peer(),
            SessionDescription::new(SdpKind::Answer, "late"),
        ))
        .await;
        assert_eq!(p.peer_state(&peer()), Some(SessionState::Closed));
        assert!(p.connector().answers.is_empty());
    }

    #[tokio::test]
    async fn test_change_room_clears_scene_and_links() {
        let mut p = joined().await;
        let other = User::new(peer(), "lobby", Pose::default());
        let snapshot = PresenceSnapshot {
            room: "lobby".to_string(),
            users: [(peer(), other)].into_iter().collect(),
        };
        p.handle(WebSocketMessage::users_updated(&snapshot)).await;
        p.handle(WebSocketMessage::add_peer(peer(), false)).await;
        assert!(p.scene().avatars.contains_key(&peer()));

        let out = p.change_room("stage").await;

        assert_eq!(types(&out), vec![MessageType::JoinRoom]);
        assert!(p.scene().avatars.is_empty());
        assert_eq!(p.peer_state(&peer()), Some(SessionState::Closed));

        // A leftover lobby snapshot no longer renders anyone
        p.handle(WebSocketMessage::users_updated(&snapshot)).await;
        assert!(p.scene().avatars.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_tears_everything_down() {
        let mut p = joined().await;
        p.handle(WebSocketMessage::add_peer(peer(), true)).await;

        p.handle(WebSocketMessage::bare(MessageType::Disconnect))
            .await;

        assert_eq!(p.peer_state(&peer()), Some(SessionState::Closed));
        assert!(p.connector().local_audio_closed);
    }
}
