use serde::{Deserialize, Serialize};

use crate::user::UserId;

/// Response for a single room lookup
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomMembersResponse {
    pub name: String,
    /// Member ids, sorted for stable output
    pub members: Vec<UserId>,
}
