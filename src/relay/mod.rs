// Public API - what other modules can use
pub use dispatcher::RelayHandler;
pub use envelope::Envelope;
pub use error::RelayError;

// Internal modules
mod dispatcher;
mod envelope;
mod error;
