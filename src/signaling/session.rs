use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};
use thiserror::Error;

use crate::user::UserId;

/// Negotiation progress of a peer audio link
///
/// Ordered: a session only ever moves to a later state, or straight to Closed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum SessionState {
    Initial,
    Offered,
    Answered,
    IceExchanging,
    Established,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Offer/answer body, passed through untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn new(kind: SdpKind, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
        }
    }
}

/// Why a signaling step was not applied. Callers drop the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("session is closed")]
    Closed,

    #[error("no session between these participants")]
    UnknownSession,

    #[error("{signal} not allowed in state {state}")]
    OutOfOrder {
        state: SessionState,
        signal: &'static str,
    },

    #[error("{0} is not a party to this session")]
    NotParticipant(UserId),

    #[error("{0} has not set a local description yet")]
    NoLocalDescription(UserId),
}

/// Signaling state between two participants
///
/// The same machine runs on the relay (fed by the messages it forwards) and on
/// each client (fed by what it sends, receives, and the connection callback).
#[derive(Debug, Clone)]
pub struct PeerSignalingSession {
    parties: (UserId, UserId),
    offerer: Option<UserId>,
    answered: bool,
    state: SessionState,
}

impl PeerSignalingSession {
    pub fn new(a: UserId, b: UserId) -> Self {
        Self {
            parties: (a, b),
            offerer: None,
            answered: false,
            state: SessionState::Initial,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Side that sent the offer
    pub fn from_id(&self) -> Option<&UserId> {
        self.offerer.as_ref()
    }

    /// Side that received the offer
    pub fn to_id(&self) -> Option<&UserId> {
        let offerer = self.offerer.as_ref()?;
        Some(self.other_party(offerer))
    }

    pub fn involves(&self, user_id: &UserId) -> bool {
        &self.parties.0 == user_id || &self.parties.1 == user_id
    }

    fn other_party(&self, user_id: &UserId) -> &UserId {
        if &self.parties.0 == user_id {
            &self.parties.1
        } else {
            &self.parties.0
        }
    }

    fn check_open(&self, from: &UserId) -> Result<(), SignalError> {
        if self.state == SessionState::Closed {
            return Err(SignalError::Closed);
        }
        if !self.involves(from) {
            return Err(SignalError::NotParticipant(from.clone()));
        }
        Ok(())
    }

    /// Initial -> Offered
    pub fn apply_offer(&mut self, from: &UserId) -> Result<SessionState, SignalError> {
        self.check_open(from)?;
        if self.state != SessionState::Initial {
            return Err(SignalError::OutOfOrder {
                state: self.state,
                signal: "offer",
            });
        }

        self.offerer = Some(from.clone());
        self.state = SessionState::Offered;
        Ok(self.state)
    }

    /// Offered -> Answered. Also accepted once while the offerer is already
    /// trickling candidates, in which case the state stays IceExchanging.
    pub fn apply_answer(&mut self, from: &UserId) -> Result<SessionState, SignalError> {
        self.check_open(from)?;

        let acceptable = matches!(
            self.state,
            SessionState::Offered | SessionState::IceExchanging
        ) && !self.answered
            && self.offerer.as_ref() != Some(from);
        if !acceptable {
            return Err(SignalError::OutOfOrder {
                state: self.state,
                signal: "answer",
            });
        }

        self.answered = true;
        if self.state == SessionState::Offered {
            self.state = SessionState::Answered;
        }
        Ok(self.state)
    }

    /// A candidate from `from`; allowed any time after its local description is set
    pub fn apply_candidate(&mut self, from: &UserId) -> Result<SessionState, SignalError> {
        self.check_open(from)?;

        let is_offerer = self.offerer.as_ref() == Some(from);
        let has_local_description = match self.state {
            SessionState::Initial => false,
            _ => is_offerer || self.answered,
        };
        if !has_local_description {
            return Err(SignalError::NoLocalDescription(from.clone()));
        }

        if matches!(self.state, SessionState::Offered | SessionState::Answered) {
            self.state = SessionState::IceExchanging;
        }
        Ok(self.state)
    }

    /// The external peer connection reported connected
    pub fn mark_connected(&mut self) -> Result<SessionState, SignalError> {
        match self.state {
            SessionState::Closed => Err(SignalError::Closed),
            SessionState::Answered | SessionState::IceExchanging if self.answered => {
                self.state = SessionState::Established;
                Ok(self.state)
            }
            state => Err(SignalError::OutOfOrder {
                state,
                signal: "connected",
            }),
        }
    }

    /// Moves to Closed. Returns false if it already was.
    pub fn close(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.state = SessionState::Closed;
        true
    }
}
