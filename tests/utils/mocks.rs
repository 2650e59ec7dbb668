#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use presence_relay::client::{ConnectorError, PeerConnector, Scene};
use presence_relay::signaling::{IceCandidate, SdpKind, SessionDescription};
use presence_relay::websockets::ConnectionManager;
use presence_relay::{User, UserId};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Connection manager that queues outbound frames per user instead of sending them
#[derive(Clone)]
pub struct MockConnectionManager {
    sent_messages: Arc<RwLock<HashMap<UserId, VecDeque<String>>>>,
    connected_users: Arc<RwLock<Vec<UserId>>>,
}

impl MockConnectionManager {
    pub fn new() -> Self {
        Self {
            sent_messages: Arc::new(RwLock::new(HashMap::new())),
            connected_users: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn get_messages_for(&self, user: &str) -> Vec<String> {
        self.sent_messages
            .read()
            .await
            .get(&UserId::from(user))
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Pops the oldest undelivered frame for `user`
    pub async fn consume_message_for(&self, user: &str) -> Option<String> {
        self.sent_messages
            .write()
            .await
            .get_mut(&UserId::from(user))
            .and_then(VecDeque::pop_front)
    }

    /// Takes every undelivered frame for `user`
    pub async fn drain_messages_for(&self, user_id: &UserId) -> Vec<String> {
        self.sent_messages
            .write()
            .await
            .get_mut(user_id)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    pub async fn clear_messages(&self) {
        self.sent_messages.write().await.clear();
    }
}

#[async_trait]
impl ConnectionManager for MockConnectionManager {
    async fn add_connection(&self, user_id: UserId, _sender: mpsc::UnboundedSender<String>) {
        self.connected_users.write().await.push(user_id);
    }

    async fn remove_connection(&self, user_id: &UserId) {
        self.connected_users.write().await.retain(|u| u != user_id);
    }

    async fn send_to_user(&self, user_id: &UserId, message: &str) {
        self.sent_messages
            .write()
            .await
            .entry(user_id.clone())
            .or_default()
            .push_back(message.to_string());
    }

    async fn broadcast_all(&self, message: &str) {
        let users = self.connected_users.read().await.clone();
        for user_id in &users {
            self.send_to_user(user_id, message).await;
        }
    }
}

/// Scene that records rendered avatars and attached audio
#[derive(Debug, Default)]
pub struct MockScene {
    pub avatars: BTreeMap<UserId, User>,
    pub first_person: Option<User>,
    pub peer_audio: BTreeSet<UserId>,
    pub removals: Vec<UserId>,
}

impl MockScene {
    pub fn renders(&self, user: &str) -> bool {
        self.avatars.contains_key(&UserId::from(user))
    }

    pub fn avatar(&self, user: &str) -> Option<&User> {
        self.avatars.get(&UserId::from(user))
    }
}

impl Scene for MockScene {
    fn spawn_avatar(&mut self, user: &User) {
        self.avatars.insert(user.id.clone(), user.clone());
    }

    fn update_avatar(&mut self, user: &User) {
        self.avatars.insert(user.id.clone(), user.clone());
    }

    fn remove_avatar(&mut self, user_id: &UserId) {
        self.avatars.remove(user_id);
        self.removals.push(user_id.clone());
    }

    fn attach_first_person(&mut self, user: &User) {
        self.first_person = Some(user.clone());
    }

    fn attach_peer_audio(&mut self, peer_id: &UserId) {
        self.peer_audio.insert(peer_id.clone());
    }

    fn detach_peer_audio(&mut self, peer_id: &UserId) {
        self.peer_audio.remove(peer_id);
    }
}

/// Peer connector that fabricates SDP and records what it was asked to do
#[derive(Debug, Default)]
pub struct MockConnector {
    pub audio_open: bool,
    pub offers_created: Vec<UserId>,
    pub offers_accepted: Vec<UserId>,
    pub answers_accepted: Vec<UserId>,
    pub candidates: HashMap<UserId, Vec<String>>,
    pub closed_peers: Vec<UserId>,
}

impl MockConnector {
    pub fn candidates_from(&self, peer: &str) -> Vec<String> {
        self.candidates
            .get(&UserId::from(peer))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PeerConnector for MockConnector {
    async fn open_local_audio(&mut self) -> Result<(), ConnectorError> {
        self.audio_open = true;
        Ok(())
    }

    async fn create_offer(&mut self, peer: &UserId) -> Result<SessionDescription, ConnectorError> {
        self.offers_created.push(peer.clone());
        Ok(SessionDescription::new(
            SdpKind::Offer,
            format!("v=0 offer for {}", peer),
        ))
    }

    async fn accept_offer(
        &mut self,
        peer: &UserId,
        _offer: SessionDescription,
    ) -> Result<SessionDescription, ConnectorError> {
        self.offers_accepted.push(peer.clone());
        Ok(SessionDescription::new(
            SdpKind::Answer,
            format!("v=0 answer for {}", peer),
        ))
    }

    async fn accept_answer(
        &mut self,
        peer: &UserId,
        _answer: SessionDescription,
    ) -> Result<(), ConnectorError> {
        self.answers_accepted.push(peer.clone());
        Ok(())
    }

    async fn add_ice_candidate(
        &mut self,
        peer: &UserId,
        candidate: IceCandidate,
    ) -> Result<(), ConnectorError> {
        self.candidates
            .entry(peer.clone())
            .or_default()
            .push(candidate.candidate);
        Ok(())
    }

    async fn close_peer(&mut self, peer: &UserId) {
        self.closed_peers.push(peer.clone());
    }

    async fn close_local_audio(&mut self) {
        self.audio_open = false;
    }
}
