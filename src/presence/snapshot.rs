use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::user::{User, UserId};

/// Point-in-time, room-filtered, self-excluded view of all poses
///
/// Each snapshot is self-contained; receivers never diff one against the next.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub room: String,
    pub users: BTreeMap<UserId, User>,
}

impl PresenceSnapshot {
    pub fn empty(room: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            users: BTreeMap::new(),
        }
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn get(&self, user_id: &UserId) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &UserId> {
        self.users.keys()
    }
}
