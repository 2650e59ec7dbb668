use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::snapshot::PresenceSnapshot;
use crate::user::{Pose, User, UserId};

/// Authoritative user id -> latest pose + room mapping
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Records the latest pose unconditionally (last-write-wins)
    async fn upsert(&self, user_id: &UserId, pose: Pose, room: &str) -> User;

    /// Drops the user's entry, returning what was stored
    async fn remove(&self, user_id: &UserId) -> Option<User>;

    async fn get(&self, user_id: &UserId) -> Option<User>;

    /// Every entry in `room` except the requester's own
    async fn snapshot(&self, room: &str, requester: &UserId) -> PresenceSnapshot;
}

/// In-memory implementation of PresenceStore
pub struct InMemoryPresenceStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl Default for InMemoryPresenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPresenceStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn upsert(&self, user_id: &UserId, pose: Pose, room: &str) -> User {
        let mut users = self.users.write().await;

        let user = users
            .entry(user_id.clone())
            .and_modify(|user| {
                user.room = room.to_string();
                user.set_pose(pose);
            })
            .or_insert_with(|| User::new(user_id.clone(), room, pose));

        user.clone()
    }

    #[instrument(skip(self))]
    async fn remove(&self, user_id: &UserId) -> Option<User> {
        let removed = self.users.write().await.remove(user_id);
        debug!(user_id = %user_id, existed = removed.is_some(), "Removed presence entry");
        removed
    }

    async fn get(&self, user_id: &UserId) -> Option<User> {
        self.users.read().await.get(user_id).cloned()
    }

    async fn snapshot(&self, room: &str, requester: &UserId) -> PresenceSnapshot {
        let users = self.users.read().await;

        PresenceSnapshot {
            room: room.to_string(),
            users: users
                .values()
                .filter(|user| user.room == room && &user.id != requester)
                .map(|user| (user.id.clone(), user.clone()))
                .collect(),
        }
    }
}
