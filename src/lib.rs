// Library crate for the presence relay
// This file exposes the public API for the server binary and integration tests

pub mod broadcast;
pub mod client;
pub mod config;
pub mod presence;
pub mod relay;
pub mod room;
pub mod shared;
pub mod signaling;
pub mod user;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use broadcast::{BroadcastPolicy, BroadcastScheduler, Gate};
pub use client::{Participant, PeerConnector, Reconciler, Scene};
pub use config::RelayConfig;
pub use presence::{InMemoryPresenceStore, PresenceSnapshot, PresenceStore};
pub use relay::{Envelope, RelayHandler};
pub use room::{InMemoryRoomRegistry, RoomRegistry};
pub use shared::{AppError, AppState};
pub use signaling::{SessionState, SignalingCoordinator};
pub use user::{Pose, User, UserId, Vec3};
pub use websockets::{ConnectionManager, MessageType, WebSocketMessage};
