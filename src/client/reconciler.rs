use std::collections::BTreeSet;
use tracing::{debug, trace};

use super::scene::Scene;
use crate::presence::PresenceSnapshot;
use crate::user::UserId;

/// What a single reconciliation pass did to the scene
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub spawned: Vec<UserId>,
    pub updated: Vec<UserId>,
    pub removed: Vec<UserId>,
}

/// Keeps the locally rendered avatar set in line with incoming snapshots
///
/// A snapshot is authoritative for its room: anyone rendered but absent from
/// it is removed, whether they disconnected or moved elsewhere. Snapshots for
/// a room other than the current one are in-flight leftovers and are skipped.
#[derive(Debug, Default)]
pub struct Reconciler {
    own_id: Option<UserId>,
    room: Option<String>,
    rendered: BTreeSet<UserId>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_identity(&mut self, own_id: UserId) {
        self.own_id = Some(own_id);
    }

    /// Switches the room snapshots are accepted for
    pub fn set_room(&mut self, room: impl Into<String>) {
        self.room = Some(room.into());
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn is_rendered(&self, user_id: &UserId) -> bool {
        self.rendered.contains(user_id)
    }

    pub fn rendered(&self) -> impl Iterator<Item = &UserId> {
        self.rendered.iter()
    }

    /// Applies one snapshot. Returns None when it belongs to another room.
    pub fn apply(
        &mut self,
        snapshot: &PresenceSnapshot,
        scene: &mut dyn Scene,
    ) -> Option<ReconcileReport> {
        if self.room.as_deref() != Some(snapshot.room.as_str()) {
            debug!(
                snapshot_room = %snapshot.room,
                current_room = ?self.room,
                "Skipping snapshot for another room"
            );
            return None;
        }

        let mut report = ReconcileReport::default();
        let mut present = BTreeSet::new();

        for (user_id, user) in &snapshot.users {
            if Some(user_id) == self.own_id.as_ref() || user.room != snapshot.room {
                continue;
            }
            present.insert(user_id.clone());

            if self.rendered.insert(user_id.clone()) {
                scene.spawn_avatar(user);
                report.spawned.push(user_id.clone());
            } else {
                scene.update_avatar(user);
                report.updated.push(user_id.clone());
            }
        }

        let gone: Vec<UserId> = self.rendered.difference(&present).cloned().collect();
        for user_id in gone {
            self.rendered.remove(&user_id);
            scene.remove_avatar(&user_id);
            report.removed.push(user_id);
        }

        trace!(
            spawned = report.spawned.len(),
            updated = report.updated.len(),
            removed = report.removed.len(),
            "Reconciled snapshot"
        );
        Some(report)
    }

    /// Fast-path removal. Returns false if the user was not rendered.
    pub fn remove(&mut self, user_id: &UserId, scene: &mut dyn Scene) -> bool {
        if !self.rendered.remove(user_id) {
            return false;
        }
        scene.remove_avatar(user_id);
        true
    }

    /// Removes every rendered avatar
    pub fn clear(&mut self, scene: &mut dyn Scene) -> Vec<UserId> {
        let cleared: Vec<UserId> = std::mem::take(&mut self.rendered).into_iter().collect();
        for user_id in &cleared {
            scene.remove_avatar(user_id);
        }
        cleared
    }
}
