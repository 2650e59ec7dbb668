use crate::user::UserId;
use crate::websockets::WebSocketMessage;

/// An outbound message addressed to one participant
#[derive(Debug, Clone)]
pub struct Envelope {
    pub recipient: UserId,
    pub message: WebSocketMessage,
}

impl Envelope {
    pub fn new(recipient: UserId, message: WebSocketMessage) -> Self {
        Self { recipient, message }
    }
}
