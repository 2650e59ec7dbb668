// Public API - what other modules can use
pub use handlers::{get_room, list_rooms};
pub use models::RoomSummary;
pub use registry::{InMemoryRoomRegistry, JoinOutcome, RoomRegistry};
pub use types::RoomMembersResponse;

// Internal modules
mod handlers;
mod models;
mod registry;
mod types;
