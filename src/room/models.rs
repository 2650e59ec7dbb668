use serde::{Deserialize, Serialize};

/// Listing entry for a live room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub name: String,
    pub member_count: usize,
}
