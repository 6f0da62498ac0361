use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, instrument};

use super::models::MessageModel;
use crate::shared::{AppError, AppState};

/// HTTP handler for room history
///
/// GET /rooms/{room_id}/messages
/// Returns the most recent messages, oldest first
#[instrument(name = "list_messages", skip(state))]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<MessageModel>>, AppError> {
    state.room_service.require_room(&room_id).await?;

    let messages = state
        .message_repository
        .list_recent(&room_id, state.config.message_history_limit)
        .await?;

    debug!(room_id = %room_id, message_count = messages.len(), "History retrieved");
    Ok(Json(messages))
}
