use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

use super::scheduler::BroadcastScheduler;
use crate::websockets::{ConnectionManager, WebSocketMessage};

/// Starts the fixed-cadence broadcast loop used by the interval policy
#[instrument(skip(scheduler, connection_manager))]
pub async fn start_broadcast_ticker(
    scheduler: Arc<BroadcastScheduler>,
    connection_manager: Arc<dyn ConnectionManager>,
    period: Duration,
) {
    info!(
        period_ms = period.as_millis() as u64,
        "Starting presence broadcast ticker"
    );

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        run_broadcast_cycle(&scheduler, &connection_manager).await;
    }
}

/// Pushes one usersUpdated to every ready participant. Returns how many were sent.
pub async fn run_broadcast_cycle(
    scheduler: &BroadcastScheduler,
    connection_manager: &Arc<dyn ConnectionManager>,
) -> usize {
    let deliveries = scheduler.snapshots_for_all_rooms().await;
    let sent = deliveries.len();

    for (recipient, snapshot) in deliveries {
        connection_manager
            .send_message(&recipient, &WebSocketMessage::users_updated(&snapshot))
            .await;
    }

    if sent > 0 {
        debug!(sent = sent, "Broadcast cycle delivered snapshots");
    }
    sent
}
