use std::collections::HashMap;
use tracing::debug;

use crate::signaling::{IceCandidate, PeerSignalingSession, SessionState, SignalError};
use crate::user::UserId;

/// Client-side signaling state for every remote peer
///
/// Closed sessions are kept until the relay announces the peer again, so
/// anything arriving late for them is rejected instead of reopening a link.
#[derive(Debug)]
pub struct PeerLinks {
    own_id: UserId,
    sessions: HashMap<UserId, PeerSignalingSession>,
    // Remote candidates that arrived before the peer's description
    pending: HashMap<UserId, Vec<IceCandidate>>,
}

impl PeerLinks {
    pub fn new(own_id: UserId) -> Self {
        Self {
            own_id,
            sessions: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn own_id(&self) -> &UserId {
        &self.own_id
    }

    /// Starts a fresh session with `peer`, replacing whatever was there
    pub fn add(&mut self, peer: &UserId) {
        self.pending.remove(peer);
        self.sessions.insert(
            peer.clone(),
            PeerSignalingSession::new(self.own_id.clone(), peer.clone()),
        );
    }

    pub fn state(&self, peer: &UserId) -> Option<SessionState> {
        self.sessions.get(peer).map(PeerSignalingSession::state)
    }

    /// Peers whose session is not closed
    pub fn open_peers(&self) -> Vec<UserId> {
        let mut peers: Vec<UserId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.state() != SessionState::Closed)
            .map(|(peer, _)| peer.clone())
            .collect();
        peers.sort();
        peers
    }

    fn session(&mut self, peer: &UserId) -> Result<&mut PeerSignalingSession, SignalError> {
        self.sessions
            .get_mut(peer)
            .ok_or(SignalError::UnknownSession)
    }

    pub fn local_offer(&mut self, peer: &UserId) -> Result<SessionState, SignalError> {
        let own = self.own_id.clone();
        self.session(peer)?.apply_offer(&own)
    }

    pub fn remote_offer(&mut self, peer: &UserId) -> Result<SessionState, SignalError> {
        self.session(peer)?.apply_offer(peer)
    }

    pub fn local_answer(&mut self, peer: &UserId) -> Result<SessionState, SignalError> {
        let own = self.own_id.clone();
        self.session(peer)?.apply_answer(&own)
    }

    pub fn remote_answer(&mut self, peer: &UserId) -> Result<SessionState, SignalError> {
        self.session(peer)?.apply_answer(peer)
    }

    pub fn local_candidate(&mut self, peer: &UserId) -> Result<SessionState, SignalError> {
        let own = self.own_id.clone();
        self.session(peer)?.apply_candidate(&own)
    }

    /// Records a remote candidate. One that outran the peer's description is
    /// held back and handed out again by `take_pending`.
    pub fn remote_candidate(
        &mut self,
        peer: &UserId,
        candidate: IceCandidate,
    ) -> Result<Option<IceCandidate>, SignalError> {
        match self.session(peer)?.apply_candidate(peer) {
            Ok(_) => Ok(Some(candidate)),
            Err(SignalError::NoLocalDescription(_)) => {
                debug!(peer_id = %peer, "Buffering early ICE candidate");
                self.pending.entry(peer.clone()).or_default().push(candidate);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Replays buffered candidates now that the peer's description is known
    pub fn take_pending(&mut self, peer: &UserId) -> Vec<IceCandidate> {
        let candidates = self.pending.remove(peer).unwrap_or_default();
        if candidates.is_empty() {
            return candidates;
        }

        match self.session(peer).and_then(|session| session.apply_candidate(peer)) {
            Ok(_) => candidates,
            Err(e) => {
                debug!(peer_id = %peer, error = %e, "Discarding buffered candidates");
                Vec::new()
            }
        }
    }

    pub fn mark_connected(&mut self, peer: &UserId) -> Result<SessionState, SignalError> {
        self.session(peer)?.mark_connected()
    }

    /// Closes the session with `peer`. Returns true if it was open.
    pub fn close(&mut self, peer: &UserId) -> bool {
        self.pending.remove(peer);
        self.sessions
            .get_mut(peer)
            .map(PeerSignalingSession::close)
            .unwrap_or(false)
    }

    /// Closes every open session and returns the affected peers
    pub fn close_all(&mut self) -> Vec<UserId> {
        let peers = self.open_peers();
        for peer in &peers {
            self.close(peer);
        }
        self.pending.clear();
        peers
    }
}
