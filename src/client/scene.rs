use crate::user::{User, UserId};

/// Rendering side of a participant, driven by the reconciler
///
/// Implementations own the actual 3-D entities; this crate only decides
/// which of these calls to make and when.
pub trait Scene {
    /// Instantiate an avatar for a remote participant
    fn spawn_avatar(&mut self, user: &User);

    /// Move an already rendered avatar in place
    fn update_avatar(&mut self, user: &User);

    fn remove_avatar(&mut self, user_id: &UserId);

    /// Bind the local camera/controls to our own avatar
    fn attach_first_person(&mut self, user: &User);

    /// Render the remote peer's audio source once the link is up
    fn attach_peer_audio(&mut self, _peer_id: &UserId) {}

    /// Drop the remote peer's audio source when the link is closed
    fn detach_peer_audio(&mut self, _peer_id: &UserId) {}
}
