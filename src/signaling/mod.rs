// Public API - what other modules can use
pub use coordinator::SignalingCoordinator;
pub use session::{
    IceCandidate, PeerSignalingSession, SdpKind, SessionDescription, SessionState, SignalError,
};

// Internal modules
mod coordinator;
mod session;
