use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::models::ReadOutcome;
use super::repository::MessageRepository;
use crate::room::service::RoomService;
use crate::session::Session;
use crate::shared::AppError;
use crate::websockets::{MessageBroadcaster, WebSocketMessage};

/// Records per-user read acknowledgements. A repeated mark is a no-op with no broadcast.
pub struct ReadReceiptTracker {
    repository: Arc<dyn MessageRepository + Send + Sync>,
    rooms: Arc<RoomService>,
    broadcaster: MessageBroadcaster,
}

impl ReadReceiptTracker {
    pub fn new(
        repository: Arc<dyn MessageRepository + Send + Sync>,
        rooms: Arc<RoomService>,
        broadcaster: MessageBroadcaster,
    ) -> Self {
        Self {
            repository,
            rooms,
            broadcaster,
        }
    }

    /// Returns true if a new receipt was recorded and broadcast
    #[instrument(skip(self, session), fields(user_id = %session.user_id()))]
    pub async fn mark_read(
        &self,
        session: &Session,
        room_id: &str,
        message_id: &str,
    ) -> Result<bool, AppError> {
        let not_found = || AppError::NotFound(format!("Message {} not found", message_id));

        let message = self
            .repository
            .get_message(message_id)
            .await?
            .ok_or_else(not_found)?;
        if message.room_id != room_id {
            return Err(not_found());
        }
        if message.has_read(session.user_id()) {
            debug!(message_id = %message_id, "Already read, nothing to do");
            return Ok(false);
        }

        let read_at = Utc::now();
        match self
            .repository
            .append_read_receipt(message_id, session.user_id(), read_at)
            .await?
        {
            ReadOutcome::Appended(_) => {
                info!(room_id = %room_id, message_id = %message_id, "Read receipt recorded");

                let recipients = self.rooms.subscriber_connections(room_id).await;
                let frame =
                    WebSocketMessage::message_read(room_id, message_id, session.user_id(), read_at);
                self.broadcaster.broadcast(&recipients, &frame).await;
                Ok(true)
            }
            // Lost a race with a concurrent mark for the same user
            ReadOutcome::AlreadyRead => Ok(false),
            ReadOutcome::MessageNotFound => Err(not_found()),
        }
    }
}
