use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::room::{models::RoomModel, service::RoomService};
use crate::session::{Identity, SessionRegistry};
use crate::shared::AppError;
use crate::websockets::{MessageBroadcaster, WebSocketMessage};

/// Adds users to a room and notifies whichever of them are online
pub struct InvitationRelay {
    rooms: Arc<RoomService>,
    sessions: Arc<SessionRegistry>,
    broadcaster: MessageBroadcaster,
}

impl InvitationRelay {
    pub fn new(
        rooms: Arc<RoomService>,
        sessions: Arc<SessionRegistry>,
        broadcaster: MessageBroadcaster,
    ) -> Self {
        Self {
            rooms,
            sessions,
            broadcaster,
        }
    }

    /// Unions `user_ids` into the room's participants through the same locked
    /// path as join, then sends ROOM_INVITATION to each target's live connections.
    /// Offline targets only get the membership change.
    #[instrument(skip(self, inviter, user_ids), fields(inviter_id = %inviter.user_id))]
    pub async fn invite(
        &self,
        inviter: &Identity,
        room_id: &str,
        user_ids: Vec<String>,
    ) -> Result<RoomModel, AppError> {
        let mut targets: Vec<String> = user_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .collect();
        if targets.is_empty() || targets.iter().any(|id| id.is_empty()) {
            return Err(AppError::ValidationFailed(
                "user_ids must be a non-empty list of ids".to_string(),
            ));
        }
        targets.sort();
        targets.dedup();

        let (room, added) = self.rooms.add_participants(room_id, &targets).await?;
        info!(
            room_id = %room_id,
            invited = targets.len(),
            newly_added = added.len(),
            "Users invited to room"
        );

        if !added.is_empty() {
            self.rooms.broadcast_participants(&room.id).await;
        }

        let invitation = WebSocketMessage::room_invitation(&room.id, &room.name, &inviter.user_id);
        for user_id in &targets {
            let connections = self.sessions.connections_for_user(user_id).await;
            debug!(user_id = %user_id, connections = connections.len(), "Notifying invited user");
            self.broadcaster.broadcast(&connections, &invitation).await;
        }

        Ok(room)
    }
}
