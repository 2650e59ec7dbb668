use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument, warn};

use super::{models::RoomSummary, types::RoomMembersResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for listing occupied rooms
///
/// GET /rooms
#[instrument(name = "list_rooms", skip(state))]
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    let rooms = state.registry.list_rooms().await;
    info!(room_count = rooms.len(), "Rooms listed successfully");
    Json(rooms)
}

/// HTTP handler for a single room's members
///
/// GET /rooms/:room
/// Rooms only exist while occupied, so an empty room is a 404
#[instrument(name = "get_room", skip(state))]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Json<RoomMembersResponse>, AppError> {
    if room.trim().is_empty() {
        return Err(AppError::BadRequest("Room name must not be empty".to_string()));
    }

    let mut members: Vec<_> = state.registry.members_of(&room).await.into_iter().collect();
    if members.is_empty() {
        warn!(room = %room, "Room not found");
        return Err(AppError::NotFound(format!("Room {} not found", room)));
    }
    members.sort();

    Ok(Json(RoomMembersResponse {
        name: room,
        members,
    }))
}
