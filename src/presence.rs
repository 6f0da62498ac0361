use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::room::service::RoomService;
use crate::session::Session;
use crate::shared::AppError;
use crate::websockets::{MessageBroadcaster, WebSocketMessage};

/// Relays ephemeral typing state. Nothing is persisted.
pub struct TypingBroadcaster {
    rooms: Arc<RoomService>,
    broadcaster: MessageBroadcaster,
}

impl TypingBroadcaster {
    pub fn new(rooms: Arc<RoomService>, broadcaster: MessageBroadcaster) -> Self {
        Self { rooms, broadcaster }
    }

    /// Sends TYPING_STATUS to every subscriber of the room except the
    /// originator's own connections
    #[instrument(skip(self, session), fields(user_id = %session.user_id()))]
    pub async fn set_typing(
        &self,
        session: &Session,
        room_id: &str,
        is_typing: bool,
    ) -> Result<(), AppError> {
        if !self.rooms.is_subscribed(room_id, &session.connection_id).await {
            warn!(room_id = %room_id, "Typing rejected: connection has not joined room");
            return Err(AppError::NotInRoom(format!("Not in room {}", room_id)));
        }

        let recipients: Vec<String> = self
            .rooms
            .current_subscribers(room_id)
            .await
            .into_iter()
            .filter(|s| s.user_id != session.user_id())
            .map(|s| s.connection_id)
            .collect();

        debug!(room_id = %room_id, recipients = recipients.len(), "Relaying typing status");
        self.broadcaster
            .broadcast(
                &recipients,
                &WebSocketMessage::typing_status(room_id, session.user_id(), is_typing),
            )
            .await;
        Ok(())
    }
}
