use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::broadcast::BroadcastScheduler;
use crate::config::RelayConfig;
use crate::presence::{InMemoryPresenceStore, PresenceStore};
use crate::relay::RelayHandler;
use crate::room::{InMemoryRoomRegistry, RoomRegistry};
use crate::signaling::SignalingCoordinator;
use crate::websockets::{ConnectionManager, InMemoryConnectionManager};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayHandler>,
    pub registry: Arc<dyn RoomRegistry>,
    pub connection_manager: Arc<dyn ConnectionManager>,
    pub config: RelayConfig,
}

impl AppState {
    pub fn new(
        relay: Arc<RelayHandler>,
        registry: Arc<dyn RoomRegistry>,
        connection_manager: Arc<dyn ConnectionManager>,
        config: RelayConfig,
    ) -> Self {
        Self {
            relay,
            registry,
            connection_manager,
            config,
        }
    }

    /// Wires the in-memory registry, store, scheduler and signaling together
    pub fn in_memory(config: RelayConfig) -> Self {
        let registry: Arc<dyn RoomRegistry> = Arc::new(InMemoryRoomRegistry::new());
        let store: Arc<dyn PresenceStore> = Arc::new(InMemoryPresenceStore::new());
        let scheduler = Arc::new(BroadcastScheduler::new(
            store.clone(),
            registry.clone(),
            config.broadcast,
        ));
        let relay = Arc::new(RelayHandler::new(
            registry.clone(),
            store,
            scheduler,
            Arc::new(SignalingCoordinator::new()),
            config.spawn,
        ));

        Self::new(
            relay,
            registry,
            Arc::new(InMemoryConnectionManager::new()),
            config,
        )
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
