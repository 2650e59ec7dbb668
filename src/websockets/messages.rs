use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use crate::presence::PresenceSnapshot;
use crate::signaling::{IceCandidate, SessionDescription};
use crate::user::{User, UserId, Vec3};

/// Message types for WebSocket communication
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    // Client -> Server
    JoinRoom,
    LeaveRoom,
    GetOthers,
    HaveGottenOthers,
    ReadyToReceiveUpdates,
    Tick,

    // Server -> Client
    CreateUser,
    GetOthersCallback,
    StartTick,
    UsersUpdated,
    RemoveUser,
    #[serde(rename = "initWebRTC")]
    InitWebRtc,
    AddPeer,
    RemovePeer,
    Disconnect,

    // Both directions
    SessionDescription,
    IceCandidate,
}

/// Metadata for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessageMeta {
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<UserId>,
}

/// Base structure for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub meta: Option<WebSocketMessageMeta>,
}

/// Client-to-Server message payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomPayload {
    pub room: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickPayload {
    pub id: UserId,
    pub position: Vec3,
    pub rotation: Vec3,
}

/// Server-to-Client message payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveUserPayload {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPeerPayload {
    pub peer_id: UserId,
    /// True when the recipient is the side that creates the offer
    pub create_offer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovePeerPayload {
    pub peer_id: UserId,
}

/// Signaling payloads. `peer_id` is the addressee going to the relay and the
/// originator coming from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescriptionPayload {
    pub peer_id: UserId,
    pub description: SessionDescription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidatePayload {
    pub peer_id: UserId,
    pub candidate: IceCandidate,
}

/// Helper functions for creating messages
impl WebSocketMessage {
    pub fn new(message_type: MessageType, payload: serde_json::Value) -> Self {
        Self {
            message_type,
            payload,
            meta: Some(WebSocketMessageMeta {
                timestamp: Utc::now(),
                user_id: None,
            }),
        }
    }

    /// Message with an empty `{}` payload
    pub fn bare(message_type: MessageType) -> Self {
        Self::new(message_type, serde_json::json!({}))
    }

    /// Stamp the sending participant into the metadata
    pub fn stamped(mut self, user_id: &UserId) -> Self {
        if let Some(meta) = self.meta.as_mut() {
            meta.user_id = Some(user_id.clone());
        }
        self
    }

    fn with_payload<T: Serialize>(message_type: MessageType, payload: &T) -> Self {
        let value = serde_json::to_value(payload).unwrap_or_else(|e| {
            warn!(message_type = ?message_type, error = %e, "Failed to encode payload");
            serde_json::Value::Null
        });
        Self::new(message_type, value)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode the payload into the struct matching this message's type
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Create a JOIN_ROOM message
    pub fn join_room(room: impl Into<String>) -> Self {
        Self::with_payload(MessageType::JoinRoom, &JoinRoomPayload { room: room.into() })
    }

    /// Create a TICK message
    pub fn tick(id: UserId, position: Vec3, rotation: Vec3) -> Self {
        Self::with_payload(
            MessageType::Tick,
            &TickPayload {
                id,
                position,
                rotation,
            },
        )
    }

    /// Create a CREATE_USER message
    pub fn create_user(user: &User) -> Self {
        Self::with_payload(MessageType::CreateUser, user)
    }

    /// Create a GET_OTHERS_CALLBACK message
    pub fn get_others_callback(snapshot: &PresenceSnapshot) -> Self {
        Self::with_payload(MessageType::GetOthersCallback, snapshot)
    }

    /// Create a USERS_UPDATED message
    pub fn users_updated(snapshot: &PresenceSnapshot) -> Self {
        Self::with_payload(MessageType::UsersUpdated, snapshot)
    }

    /// Create a REMOVE_USER message
    pub fn remove_user(user_id: UserId) -> Self {
        Self::with_payload(MessageType::RemoveUser, &RemoveUserPayload { user_id })
    }

    /// Create an ADD_PEER message
    pub fn add_peer(peer_id: UserId, create_offer: bool) -> Self {
        Self::with_payload(
            MessageType::AddPeer,
            &AddPeerPayload {
                peer_id,
                create_offer,
            },
        )
    }

    /// Create a REMOVE_PEER message
    pub fn remove_peer(peer_id: UserId) -> Self {
        Self::with_payload(MessageType::RemovePeer, &RemovePeerPayload { peer_id })
    }

    /// Create a SESSION_DESCRIPTION message
    pub fn session_description(peer_id: UserId, description: SessionDescription) -> Self {
        Self::with_payload(
            MessageType::SessionDescription,
            &SessionDescriptionPayload {
                peer_id,
                description,
            },
        )
    }

    /// Create an ICE_CANDIDATE message
    pub fn ice_candidate(peer_id: UserId, candidate: IceCandidate) -> Self {
        Self::with_payload(
            MessageType::IceCandidate,
            &IceCandidatePayload { peer_id, candidate },
        )
    }
}
