use async_trait::async_trait;
use thiserror::Error;

use crate::signaling::{IceCandidate, SessionDescription};
use crate::user::UserId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("local audio unavailable: {0}")]
    AudioUnavailable(String),

    #[error("negotiation with {peer} failed: {reason}")]
    Negotiation { peer: UserId, reason: String },

    #[error("no peer connection for {0}")]
    UnknownPeer(UserId),
}

/// Media side of peer audio links
///
/// Wraps whatever actually captures audio and runs peer connections. The
/// participant tells it what to negotiate; it never sees the relay.
#[async_trait]
pub trait PeerConnector: Send {
    async fn open_local_audio(&mut self) -> Result<(), ConnectorError>;

    /// Create a connection to `peer` and return its local offer
    async fn create_offer(&mut self, peer: &UserId) -> Result<SessionDescription, ConnectorError>;

    /// Apply a remote offer and return the local answer
    async fn accept_offer(
        &mut self,
        peer: &UserId,
        offer: SessionDescription,
    ) -> Result<SessionDescription, ConnectorError>;

    async fn accept_answer(
        &mut self,
        peer: &UserId,
        answer: SessionDescription,
    ) -> Result<(), ConnectorError>;

    async fn add_ice_candidate(
        &mut self,
        peer: &UserId,
        candidate: IceCandidate,
    ) -> Result<(), ConnectorError>;

    /// Tear down the connection to `peer`, releasing its audio
    async fn close_peer(&mut self, peer: &UserId);

    async fn close_local_audio(&mut self);
}
