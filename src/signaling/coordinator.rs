use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::session::{PeerSignalingSession, SdpKind, SessionState, SignalError};
use crate::user::UserId;

/// Unordered pair of participants
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PairKey(UserId, UserId);

impl PairKey {
    fn new(a: &UserId, b: &UserId) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }

    fn other(&self, user_id: &UserId) -> Option<&UserId> {
        if &self.0 == user_id {
            Some(&self.1)
        } else if &self.1 == user_id {
            Some(&self.0)
        } else {
            None
        }
    }
}

/// Relay-side tracker for offer/answer/ICE traffic between participant pairs
///
/// Only routes and validates ordering; descriptions and candidates are never
/// inspected. Established is never reached here since the connected signal
/// stays local to each client.
pub struct SignalingCoordinator {
    sessions: RwLock<HashMap<PairKey, PeerSignalingSession>>,
}

impl Default for SignalingCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalingCoordinator {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a fresh Initial session for a pair, replacing any closed one
    #[instrument(skip(self))]
    pub async fn pair(&self, a: &UserId, b: &UserId) {
        let mut sessions = self.sessions.write().await;
        let key = PairKey::new(a, b);

        match sessions.get(&key).map(PeerSignalingSession::state) {
            Some(state) if state != SessionState::Closed => {
                debug!(state = %state, "Pair already has a live session");
            }
            _ => {
                sessions.insert(key, PeerSignalingSession::new(a.clone(), b.clone()));
                debug!("Paired participants");
            }
        }
    }

    async fn apply<F>(&self, from: &UserId, to: &UserId, step: F) -> Result<SessionState, SignalError>
    where
        F: FnOnce(&mut PeerSignalingSession) -> Result<SessionState, SignalError>,
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&PairKey::new(from, to))
            .ok_or(SignalError::UnknownSession)?;
        step(session)
    }

    /// Validates an offer/answer from `from` addressed to `to`
    pub async fn relay_description(
        &self,
        from: &UserId,
        to: &UserId,
        kind: SdpKind,
    ) -> Result<SessionState, SignalError> {
        self.apply(from, to, |session| match kind {
            SdpKind::Offer => session.apply_offer(from),
            SdpKind::Answer => session.apply_answer(from),
        })
        .await
    }

    /// Validates an ICE candidate from `from` addressed to `to`
    pub async fn relay_candidate(
        &self,
        from: &UserId,
        to: &UserId,
    ) -> Result<SessionState, SignalError> {
        self.apply(from, to, |session| session.apply_candidate(from))
            .await
    }

    /// Closes every open session naming `user_id`; returns the other parties.
    /// Closed sessions stay behind so late messages keep getting dropped.
    #[instrument(skip(self))]
    pub async fn close_all_for(&self, user_id: &UserId) -> Vec<UserId> {
        let mut sessions = self.sessions.write().await;
        let mut peers: Vec<UserId> = sessions
            .iter_mut()
            .filter_map(|(key, session)| {
                let peer = key.other(user_id)?;
                session.close().then(|| peer.clone())
            })
            .collect();
        peers.sort();

        info!(user_id = %user_id, closed = peers.len(), "Closed peer sessions");
        peers
    }

    /// Destroys every session naming `user_id`
    pub async fn forget(&self, user_id: &UserId) {
        self.sessions
            .write()
            .await
            .retain(|key, _| key.other(user_id).is_none());
    }

    pub async fn state_of(&self, a: &UserId, b: &UserId) -> Option<SessionState> {
        self.sessions
            .read()
            .await
            .get(&PairKey::new(a, b))
            .map(PeerSignalingSession::state)
    }
}
