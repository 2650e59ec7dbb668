use axum::{routing::get, Router};
use presence_relay::broadcast::{start_broadcast_ticker, BroadcastPolicy};
use presence_relay::room::{get_room, list_rooms};
use presence_relay::websockets::{broadcast_disconnect, websocket_handler, ConnectionManager};
use presence_relay::{AppState, RelayConfig};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "presence_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        broadcast = ?config.broadcast,
        spawn_radius = config.spawn.radius,
        "Starting presence relay"
    );

    let app_state = AppState::in_memory(config.clone());

    if let BroadcastPolicy::Interval(period) = config.broadcast {
        tokio::spawn(start_broadcast_ticker(
            app_state.relay.scheduler().clone(),
            app_state.connection_manager.clone(),
            period,
        ));
    }

    let connection_manager = app_state.connection_manager.clone();

    let app = Router::new()
        .route("/", get(|| async { "Presence relay is running" }))
        .route("/ws", get(websocket_handler))
        .route("/rooms", get(list_rooms))
        .route("/rooms/:room", get(get_room))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server running on http://{}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(connection_manager))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, after telling every connected participant to tear down
async fn shutdown_signal(connection_manager: Arc<dyn ConnectionManager>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    info!("Shutdown requested, disconnecting participants");
    broadcast_disconnect(connection_manager.as_ref()).await;
}
