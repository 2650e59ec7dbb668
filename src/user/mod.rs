// Public API - what other modules can use
pub use models::{Pose, User, UserId, Vec3};

// Internal modules
mod models;
