use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::envelope::Envelope;
use super::error::RelayError;
use crate::broadcast::BroadcastScheduler;
use crate::config::SpawnArea;
use crate::presence::{PresenceSnapshot, PresenceStore};
use crate::room::{JoinOutcome, RoomRegistry};
use crate::signaling::SignalingCoordinator;
use crate::user::{Pose, UserId};
use crate::websockets::messages::{
    IceCandidatePayload, JoinRoomPayload, SessionDescriptionPayload, TickPayload,
};
use crate::websockets::{MessageType, WebSocketMessage};

/// Server side of the protocol
///
/// Every inbound frame is dispatched on its tag to a handler that updates the
/// shared state and returns the messages to send. Nothing here touches a socket.
pub struct RelayHandler {
    registry: Arc<dyn RoomRegistry>,
    store: Arc<dyn PresenceStore>,
    scheduler: Arc<BroadcastScheduler>,
    signaling: Arc<SignalingCoordinator>,
    spawn: SpawnArea,
    // Serializes join/leave/disconnect across the registry, store, and signaling
    lifecycle: Mutex<()>,
}

type HandlerResult = Result<Vec<Envelope>, RelayError>;

impl RelayHandler {
    pub fn new(
        registry: Arc<dyn RoomRegistry>,
        store: Arc<dyn PresenceStore>,
        scheduler: Arc<BroadcastScheduler>,
        signaling: Arc<SignalingCoordinator>,
        spawn: SpawnArea,
    ) -> Self {
        Self {
            registry,
            store,
            scheduler,
            signaling,
            spawn,
            lifecycle: Mutex::new(()),
        }
    }

    pub fn scheduler(&self) -> &Arc<BroadcastScheduler> {
        &self.scheduler
    }

    pub fn signaling(&self) -> &Arc<SignalingCoordinator> {
        &self.signaling
    }

    /// Arms the readiness gate for a new connection
    pub async fn connect_as(&self, user_id: &UserId) {
        self.scheduler.arm(user_id).await;
        info!(user_id = %user_id, "Participant connected");
    }

    /// Parses a raw text frame and dispatches it; unparseable frames are dropped
    pub async fn handle_text(&self, from: &UserId, raw: &str) -> Vec<Envelope> {
        match serde_json::from_str::<WebSocketMessage>(raw) {
            Ok(message) => self.handle(from, message).await,
            Err(e) => {
                warn!(user_id = %from, error = %RelayError::MalformedFrame(e), "Dropping frame");
                Vec::new()
            }
        }
    }

    /// Dispatches one inbound message. Failures are logged and yield no output.
    #[instrument(skip(self, message), fields(message_type = ?message.message_type))]
    pub async fn handle(&self, from: &UserId, message: WebSocketMessage) -> Vec<Envelope> {
        let result = match message.message_type {
            MessageType::JoinRoom => self.on_join_room(from, &message).await,
            MessageType::LeaveRoom => self.on_leave_room(from).await,
            MessageType::GetOthers => self.on_get_others(from).await,
            MessageType::HaveGottenOthers | MessageType::ReadyToReceiveUpdates => {
                self.on_ready(from).await
            }
            MessageType::Tick => self.on_tick(from, &message).await,
            MessageType::SessionDescription => self.on_session_description(from, &message).await,
            MessageType::IceCandidate => self.on_ice_candidate(from, &message).await,
            other => Err(RelayError::Unexpected(other)),
        };

        match result {
            Ok(envelopes) => envelopes,
            Err(e) if e.is_stale() => {
                debug!(user_id = %from, error = %e, "Dropped stale signaling message");
                Vec::new()
            }
            Err(e) => {
                warn!(user_id = %from, error = %e, "Dropped inbound message");
                Vec::new()
            }
        }
    }

    /// Terminal cleanup for a closed connection, atomic across every owner
    #[instrument(skip(self))]
    pub async fn disconnect(&self, user_id: &UserId) -> Vec<Envelope> {
        let _guard = self.lifecycle.lock().await;

        let room = self.registry.leave(user_id).await;
        self.store.remove(user_id).await;
        self.scheduler.withdraw(user_id).await;
        let peers = self.signaling.close_all_for(user_id).await;
        self.signaling.forget(user_id).await;

        let mut envelopes: Vec<Envelope> = peers
            .into_iter()
            .map(|peer| Envelope::new(peer, WebSocketMessage::remove_peer(user_id.clone())))
            .collect();

        if let Some(room) = &room {
            let mut members: Vec<UserId> =
                self.registry.members_of(room).await.into_iter().collect();
            members.sort();
            envelopes.extend(members.into_iter().map(|member| {
                Envelope::new(member, WebSocketMessage::remove_user(user_id.clone()))
            }));
        }

        info!(user_id = %user_id, room = ?room, "Participant disconnected");
        envelopes
    }

    fn decode<T: serde::de::DeserializeOwned>(message: &WebSocketMessage) -> Result<T, RelayError> {
        message
            .payload_as()
            .map_err(|source| RelayError::MalformedPayload {
                message_type: message.message_type,
                source,
            })
    }

    fn snapshot_envelopes(deliveries: Vec<(UserId, PresenceSnapshot)>) -> Vec<Envelope> {
        deliveries
            .into_iter()
            .map(|(recipient, snapshot)| {
                Envelope::new(recipient, WebSocketMessage::users_updated(&snapshot))
            })
            .collect()
    }

    /// Closes every session naming `user_id` and tells both sides to drop the link
    async fn unpair_all(&self, user_id: &UserId) -> Vec<Envelope> {
        let peers = self.signaling.close_all_for(user_id).await;
        let mut envelopes = Vec::with_capacity(peers.len() * 2);
        for peer in peers {
            envelopes.push(Envelope::new(
                peer.clone(),
                WebSocketMessage::remove_peer(user_id.clone()),
            ));
            envelopes.push(Envelope::new(
                user_id.clone(),
                WebSocketMessage::remove_peer(peer),
            ));
        }
        envelopes
    }

    async fn on_join_room(&self, from: &UserId, message: &WebSocketMessage) -> HandlerResult {
        let JoinRoomPayload { room } = Self::decode(message)?;
        let room = room.trim().to_string();
        if room.is_empty() {
            return Err(RelayError::EmptyRoom);
        }

        let _guard = self.lifecycle.lock().await;

        let previous = match self.registry.join(from, &room).await {
            JoinOutcome::AlreadyMember => {
                let user = match self.store.get(from).await {
                    Some(user) => user,
                    None => {
                        let pose = Pose::spawn(self.spawn.radius, self.spawn.height);
                        self.store.upsert(from, pose, &room).await
                    }
                };
                return Ok(vec![Envelope::new(
                    from.clone(),
                    WebSocketMessage::create_user(&user),
                )]);
            }
            JoinOutcome::Joined { previous } => previous,
        };

        let mut envelopes = Vec::new();
        if previous.is_some() {
            envelopes.extend(self.unpair_all(from).await);
        }

        let pose = match self.store.get(from).await {
            Some(existing) => existing.pose(),
            None => Pose::spawn(self.spawn.radius, self.spawn.height),
        };
        let user = self.store.upsert(from, pose, &room).await;

        envelopes.push(Envelope::new(
            from.clone(),
            WebSocketMessage::create_user(&user),
        ));
        envelopes.push(Envelope::new(
            from.clone(),
            WebSocketMessage::bare(MessageType::InitWebRtc),
        ));

        let mut members: Vec<UserId> = self
            .registry
            .members_of(&room)
            .await
            .into_iter()
            .filter(|member| member != from)
            .collect();
        members.sort();

        // The newcomer creates the offer towards everyone already present
        for member in members {
            self.signaling.pair(from, &member).await;
            envelopes.push(Envelope::new(
                from.clone(),
                WebSocketMessage::add_peer(member.clone(), true),
            ));
            envelopes.push(Envelope::new(
                member,
                WebSocketMessage::add_peer(from.clone(), false),
            ));
        }

        if let Some(previous) = &previous {
            envelopes.extend(Self::snapshot_envelopes(
                self.scheduler.on_presence_changed(previous).await,
            ));
        }
        envelopes.extend(Self::snapshot_envelopes(
            self.scheduler.on_presence_changed(&room).await,
        ));

        info!(user_id = %from, room = %room, previous = ?previous, "Participant joined room");
        Ok(envelopes)
    }

    async fn on_leave_room(&self, from: &UserId) -> HandlerResult {
        let _guard = self.lifecycle.lock().await;

        let Some(room) = self.registry.leave(from).await else {
            return Ok(Vec::new());
        };
        self.store.remove(from).await;

        let mut envelopes = self.unpair_all(from).await;
        envelopes.extend(Self::snapshot_envelopes(
            self.scheduler.on_presence_changed(&room).await,
        ));

        info!(user_id = %from, room = %room, "Participant left room");
        Ok(envelopes)
    }

    async fn on_get_others(&self, from: &UserId) -> HandlerResult {
        let room = self
            .registry
            .room_of(from)
            .await
            .ok_or_else(|| RelayError::NotInRoom(from.clone()))?;

        let snapshot = self.store.snapshot(&room, from).await;
        self.scheduler.prime(from).await;
        Ok(vec![Envelope::new(
            from.clone(),
            WebSocketMessage::get_others_callback(&snapshot),
        )])
    }

    /// Only opens the gate after the initial peer list was requested
    async fn on_ready(&self, from: &UserId) -> HandlerResult {
        if !self.scheduler.release(from).await {
            return Ok(Vec::new());
        }
        Ok(vec![Envelope::new(
            from.clone(),
            WebSocketMessage::bare(MessageType::StartTick),
        )])
    }

    async fn on_tick(&self, from: &UserId, message: &WebSocketMessage) -> HandlerResult {
        let tick: TickPayload = Self::decode(message)?;
        if &tick.id != from {
            return Err(RelayError::ForeignPose {
                sender: from.clone(),
                claimed: tick.id,
            });
        }

        let room = self
            .registry
            .room_of(from)
            .await
            .ok_or_else(|| RelayError::NotInRoom(from.clone()))?;

        self.store
            .upsert(from, Pose::new(tick.position, tick.rotation), &room)
            .await;

        Ok(Self::snapshot_envelopes(
            self.scheduler.on_presence_changed(&room).await,
        ))
    }

    async fn on_session_description(
        &self,
        from: &UserId,
        message: &WebSocketMessage,
    ) -> HandlerResult {
        let SessionDescriptionPayload {
            peer_id,
            description,
        } = Self::decode(message)?;

        let state = self
            .signaling
            .relay_description(from, &peer_id, description.kind)
            .await?;
        debug!(from = %from, to = %peer_id, state = %state, "Relaying session description");

        Ok(vec![Envelope::new(
            peer_id,
            WebSocketMessage::session_description(from.clone(), description).stamped(from),
        )])
    }

    async fn on_ice_candidate(&self, from: &UserId, message: &WebSocketMessage) -> HandlerResult {
        let IceCandidatePayload { peer_id, candidate } = Self::decode(message)?;

        self.signaling.relay_candidate(from, &peer_id).await?;

        Ok(vec![Envelope::new(
            peer_id,
            WebSocketMessage::ice_candidate(from.clone(), candidate).stamped(from),
        )])
    }
}
