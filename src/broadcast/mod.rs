// Public API - what other modules can use
pub use gate::Gate;
pub use scheduler::{BroadcastPolicy, BroadcastScheduler};
pub use ticker::{run_broadcast_cycle, start_broadcast_ticker};

// Internal modules
mod gate;
mod scheduler;
mod ticker;
