// Public API - what other modules can use
pub use connector::{ConnectorError, PeerConnector};
pub use participant::Participant;
pub use peer::PeerLinks;
pub use reconciler::{ReconcileReport, Reconciler};
pub use scene::Scene;

// Internal modules
mod connector;
mod participant;
mod peer;
mod reconciler;
mod scene;
