use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::models::RoomSummary;
use crate::user::UserId;

/// Result of a join request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// User is now a member; `previous` is the room it was moved out of
    Joined { previous: Option<String> },
    /// User was already a member of the requested room
    AlreadyMember,
}

/// Room name -> member set, with single-room membership per user
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Adds the user to `room`, removing it from any prior room first
    async fn join(&self, user_id: &UserId, room: &str) -> JoinOutcome;

    /// Removes the user from whatever room it is in. Returns the room it left.
    async fn leave(&self, user_id: &UserId) -> Option<String>;

    /// Current members of `room`, empty for unknown rooms
    async fn members_of(&self, room: &str) -> HashSet<UserId>;

    /// Room the user currently belongs to
    async fn room_of(&self, user_id: &UserId) -> Option<String>;

    /// All non-empty rooms
    async fn list_rooms(&self) -> Vec<RoomSummary>;
}

#[derive(Default)]
struct RegistryInner {
    rooms: HashMap<String, HashSet<UserId>>,
    membership: HashMap<UserId, String>,
}

impl RegistryInner {
    fn detach(&mut self, user_id: &UserId) -> Option<String> {
        let room = self.membership.remove(user_id)?;

        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(user_id);
            if members.is_empty() {
                self.rooms.remove(&room);
                debug!(room = %room, "Room emptied and dropped");
            }
        }

        Some(room)
    }
}

/// In-memory registry; both indexes sit behind one lock so a move between
/// rooms is a single critical section
pub struct InMemoryRoomRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for InMemoryRoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }
}

#[async_trait]
impl RoomRegistry for InMemoryRoomRegistry {
    #[instrument(skip(self))]
    async fn join(&self, user_id: &UserId, room: &str) -> JoinOutcome {
        let mut inner = self.inner.write().await;

        if inner.membership.get(user_id).map(String::as_str) == Some(room) {
            debug!(user_id = %user_id, room = %room, "User already in room");
            return JoinOutcome::AlreadyMember;
        }

        let previous = inner.detach(user_id);
        inner
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(user_id.clone());
        inner.membership.insert(user_id.clone(), room.to_string());

        info!(
            user_id = %user_id,
            room = %room,
            previous = ?previous,
            "User joined room"
        );

        JoinOutcome::Joined { previous }
    }

    #[instrument(skip(self))]
    async fn leave(&self, user_id: &UserId) -> Option<String> {
        let left = self.inner.write().await.detach(user_id);

        match &left {
            Some(room) => info!(user_id = %user_id, room = %room, "User left room"),
            None => debug!(user_id = %user_id, "Leave for user not in any room"),
        }

        left
    }

    async fn members_of(&self, room: &str) -> HashSet<UserId> {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .cloned()
            .unwrap_or_default()
    }

    async fn room_of(&self, user_id: &UserId) -> Option<String> {
        self.inner.read().await.membership.get(user_id).cloned()
    }

    async fn list_rooms(&self) -> Vec<RoomSummary> {
        let inner = self.inner.read().await;
        let mut rooms: Vec<RoomSummary> = inner
            .rooms
            .iter()
            .map(|(name, members)| RoomSummary {
                name: name.clone(),
                member_count: members.len(),
            })
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }
}
