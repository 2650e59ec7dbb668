use thiserror::Error;

use crate::signaling::SignalError;
use crate::user::UserId;
use crate::websockets::MessageType;

/// Reasons an inbound frame produced no effect. None of these are fatal.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    #[error("malformed {message_type:?} payload: {source}")]
    MalformedPayload {
        message_type: MessageType,
        #[source]
        source: serde_json::Error,
    },

    #[error("room name must not be empty")]
    EmptyRoom,

    #[error("{sender} sent a pose for {claimed}")]
    ForeignPose { sender: UserId, claimed: UserId },

    #[error("{0} is not in a room")]
    NotInRoom(UserId),

    #[error("{0:?} is not accepted from clients")]
    Unexpected(MessageType),

    #[error("stale signaling: {0}")]
    Signal(#[from] SignalError),
}

impl RelayError {
    /// Stale-session drops are routine and only worth a debug line
    pub fn is_stale(&self) -> bool {
        matches!(self, RelayError::Signal(_))
    }
}
