use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::models::{MessageContent, MessageModel, NewMessage};
use super::repository::MessageRepository;
use crate::room::{locks::KeyedLocks, service::RoomService};
use crate::session::Session;
use crate::shared::AppError;
use crate::websockets::{MessageBroadcaster, WebSocketMessage};

/// Persists inbound messages, then fans them out to the room's subscribers.
///
/// Nothing is broadcast unless the insert succeeded. One sender's messages to
/// one room are persisted and enqueued under a per-(room, sender) lock, so
/// they reach every subscriber in persistence order.
pub struct MessagePipeline {
    repository: Arc<dyn MessageRepository + Send + Sync>,
    rooms: Arc<RoomService>,
    broadcaster: MessageBroadcaster,
    sequencer: KeyedLocks<(String, String)>,
    max_message_length: usize,
}

impl MessagePipeline {
    pub fn new(
        repository: Arc<dyn MessageRepository + Send + Sync>,
        rooms: Arc<RoomService>,
        broadcaster: MessageBroadcaster,
        max_message_length: usize,
    ) -> Self {
        Self {
            repository,
            rooms,
            broadcaster,
            sequencer: KeyedLocks::new(),
            max_message_length,
        }
    }

    #[instrument(skip(self, session, content), fields(user_id = %session.user_id(), connection_id = %session.connection_id))]
    pub async fn send(
        &self,
        session: &Session,
        room_id: &str,
        content: MessageContent,
    ) -> Result<MessageModel, AppError> {
        let content = content.validate(self.max_message_length)?;

        if !self.rooms.is_subscribed(room_id, &session.connection_id).await {
            warn!(room_id = %room_id, "Send rejected: connection has not joined room");
            return Err(AppError::NotInRoom(format!(
                "Join room {} before sending messages",
                room_id
            )));
        }

        let _sequence = self
            .sequencer
            .acquire(&(room_id.to_string(), session.user_id().to_string()))
            .await;

        let message = self
            .repository
            .insert_message(NewMessage {
                room_id: room_id.to_string(),
                sender_id: session.user_id().to_string(),
                sender_name: session.username().to_string(),
                text: content.text,
                file: content.file,
            })
            .await
            .map_err(|e| {
                warn!(room_id = %room_id, error = %e, "Message persistence failed, not broadcasting");
                match e {
                    AppError::PersistenceFailed(_) => e,
                    other => AppError::PersistenceFailed(other.to_string()),
                }
            })?;

        let recipients = self.rooms.subscriber_connections(room_id).await;
        debug!(
            room_id = %room_id,
            message_id = %message.id,
            recipients = recipients.len(),
            "Message persisted, broadcasting"
        );
        self.broadcaster
            .broadcast(&recipients, &WebSocketMessage::receive_message(&message))
            .await;

        info!(room_id = %room_id, message_id = %message.id, "Message delivered");
        Ok(message)
    }
}
