use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::{info, instrument};

use super::types::{InviteRequest, RoomCreateRequest, RoomResponse};
use crate::session::Identity;
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new room
///
/// POST /rooms
/// The authenticated caller becomes the first participant
#[instrument(name = "create_room", skip(state, identity, request), fields(user_id = %identity.user_id))]
pub async fn create_room(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<RoomCreateRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), AppError> {
    let room = state.room_service.create_room(&identity, request).await?;

    info!(room_id = %room.id, "Room created via HTTP");
    Ok((StatusCode::CREATED, Json(room)))
}

/// HTTP handler for listing all rooms
///
/// GET /rooms
/// Returns every room, newest first
#[instrument(name = "list_rooms", skip(state))]
pub async fn list_rooms(
    State(state): State<AppState>,
) -> Result<Json<Vec<RoomResponse>>, AppError> {
    let rooms = state.room_service.list_rooms().await?;
    Ok(Json(rooms))
}

/// POST /rooms/{room_id}/invite
#[instrument(name = "invite_users", skip(state, identity, request), fields(user_id = %identity.user_id))]
pub async fn invite_users(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(room_id): Path<String>,
    Json(request): Json<InviteRequest>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = state
        .invitations
        .invite(&identity, &room_id, request.user_ids)
        .await?;

    Ok(Json(state.room_service.room_response(&room).await))
}
