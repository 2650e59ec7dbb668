use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::gate::Gate;
use crate::presence::{PresenceSnapshot, PresenceStore};
use crate::room::RoomRegistry;
use crate::user::UserId;

/// When snapshots are pushed to ready participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastPolicy {
    /// Every accepted pose update fans out to the rest of its room
    #[default]
    OnChange,
    /// A background ticker pushes every room on a fixed cadence
    Interval(Duration),
}

/// Decides who receives which snapshot, and when
///
/// Each connection gets a gate on connect. It is primed when the participant
/// asks for the initial peer list and opened by the ready signal; only
/// participants with an open gate receive snapshots. Gates are never re-armed.
pub struct BroadcastScheduler {
    store: Arc<dyn PresenceStore>,
    registry: Arc<dyn RoomRegistry>,
    gates: RwLock<HashMap<UserId, Gate>>,
    policy: BroadcastPolicy,
}

impl BroadcastScheduler {
    pub fn new(
        store: Arc<dyn PresenceStore>,
        registry: Arc<dyn RoomRegistry>,
        policy: BroadcastPolicy,
    ) -> Self {
        Self {
            store,
            registry,
            gates: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Arms a closed gate for a new session. An existing gate is left alone.
    pub async fn arm(&self, user_id: &UserId) {
        self.gates
            .write()
            .await
            .entry(user_id.clone())
            .or_insert_with(Gate::closed);
    }

    /// Records that the user has requested the initial peer list
    pub async fn prime(&self, user_id: &UserId) {
        if let Some(gate) = self.gates.write().await.get_mut(user_id) {
            gate.prime();
        }
    }

    /// Opens the user's gate, which enrolls them as a broadcast target.
    /// Returns true only for the call that actually opened it.
    #[instrument(skip(self))]
    pub async fn release(&self, user_id: &UserId) -> bool {
        let mut gates = self.gates.write().await;
        let Some(gate) = gates.get_mut(user_id) else {
            debug!(user_id = %user_id, "Ready signal without an armed gate");
            return false;
        };

        match *gate {
            Gate::Closed => {
                debug!(user_id = %user_id, "Ready signal before the initial peer list");
                false
            }
            Gate::Primed => {
                gate.open();
                info!(user_id = %user_id, "Readiness gate released");
                true
            }
            Gate::Open => false,
        }
    }

    /// Forgets the user's gate
    pub async fn withdraw(&self, user_id: &UserId) {
        self.gates.write().await.remove(user_id);
    }

    pub async fn is_target(&self, user_id: &UserId) -> bool {
        self.gates
            .read()
            .await
            .get(user_id)
            .is_some_and(Gate::is_open)
    }

    /// One self-excluded snapshot per ready member of `room`
    pub async fn snapshots_for_room(&self, room: &str) -> Vec<(UserId, PresenceSnapshot)> {
        let mut members: Vec<UserId> = {
            let gates = self.gates.read().await;
            self.registry
                .members_of(room)
                .await
                .into_iter()
                .filter(|member| gates.get(member).is_some_and(Gate::is_open))
                .collect()
        };
        members.sort();

        let mut snapshots = Vec::with_capacity(members.len());
        for member in members {
            let snapshot = self.store.snapshot(room, &member).await;
            snapshots.push((member, snapshot));
        }
        snapshots
    }

    /// Snapshots owed after a pose change in `room`; none under the interval policy
    pub async fn on_presence_changed(&self, room: &str) -> Vec<(UserId, PresenceSnapshot)> {
        match self.policy {
            BroadcastPolicy::OnChange => self.snapshots_for_room(room).await,
            BroadcastPolicy::Interval(_) => Vec::new(),
        }
    }

    /// Snapshots for every ready participant in every room
    pub async fn snapshots_for_all_rooms(&self) -> Vec<(UserId, PresenceSnapshot)> {
        let mut snapshots = Vec::new();
        for room in self.registry.list_rooms().await {
            snapshots.extend(self.snapshots_for_room(&room.name).await);
        }
        snapshots
    }
}
