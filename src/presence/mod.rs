// Public API - what other modules can use
pub use snapshot::PresenceSnapshot;
pub use store::{InMemoryPresenceStore, PresenceStore};

// Internal modules
mod snapshot;
mod store;
