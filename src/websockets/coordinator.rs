use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::broadcast::MessageBroadcaster;
use super::connection_manager::ConnectionManager;
use super::messages::{ClientEvent, WebSocketMessage};
use super::socket::{Connection, MessageHandler, SocketWrapper};
use crate::invitation::InvitationRelay;
use crate::message::{pipeline::MessagePipeline, receipts::ReadReceiptTracker};
use crate::presence::TypingBroadcaster;
use crate::room::service::RoomService;
use crate::session::{Identity, Session, SessionRegistry};
use crate::shared::AppError;
use crate::user::UserDirectory;

const CLEANUP_BACKOFF_BASE_MS: u64 = 50;

/// Binds transport connections to the room services.
///
/// Lifecycle per connection: `connect` (session registered, READY sent), then
/// any number of inbound events through `handle_message`, then `disconnect`,
/// which runs its cleanup exactly once however the connection ended.
pub struct ConnectionCoordinator {
    sessions: Arc<SessionRegistry>,
    connections: Arc<dyn ConnectionManager>,
    broadcaster: MessageBroadcaster,
    directory: Arc<dyn UserDirectory>,
    rooms: Arc<RoomService>,
    pipeline: Arc<MessagePipeline>,
    receipts: Arc<ReadReceiptTracker>,
    typing: Arc<TypingBroadcaster>,
    invitations: Arc<InvitationRelay>,
    cleanup_retry_attempts: u32,
}

impl ConnectionCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionRegistry>,
        connections: Arc<dyn ConnectionManager>,
        broadcaster: MessageBroadcaster,
        directory: Arc<dyn UserDirectory>,
        rooms: Arc<RoomService>,
        pipeline: Arc<MessagePipeline>,
        receipts: Arc<ReadReceiptTracker>,
        typing: Arc<TypingBroadcaster>,
        invitations: Arc<InvitationRelay>,
        cleanup_retry_attempts: u32,
    ) -> Self {
        Self {
            sessions,
            connections,
            broadcaster,
            directory,
            rooms,
            pipeline,
            receipts,
            typing,
            invitations,
            cleanup_retry_attempts,
        }
    }

    /// Registers an authenticated connection and returns its connection id
    #[instrument(skip(self, identity, sender), fields(user_id = %identity.user_id))]
    pub async fn connect(
        &self,
        identity: Identity,
        sender: mpsc::UnboundedSender<String>,
    ) -> String {
        let connection_id = Uuid::new_v4().to_string();

        self.connections
            .add_connection(connection_id.clone(), sender)
            .await;
        self.directory
            .remember(&identity.user_id, &identity.username)
            .await;
        let session_id = self.sessions.register(&connection_id, identity.clone()).await;

        self.broadcaster
            .send_to_connection(
                &connection_id,
                &WebSocketMessage::ready(&identity.user_id, &identity.username, &session_id),
            )
            .await;

        info!(connection_id = %connection_id, session_id = %session_id, "Connection authenticated");
        connection_id
    }

    /// Runs an authenticated socket to completion, then cleans up after it
    pub async fn serve(self: Arc<Self>, identity: Identity, socket: Box<dyn SocketWrapper>) {
        let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();
        let connection_id = self.connect(identity, outbound_sender).await;

        let handler: Arc<dyn MessageHandler> = self.clone();
        let connection = Connection::new(connection_id.clone(), socket, outbound_receiver, handler);

        match connection.run().await {
            Ok(()) => info!(connection_id = %connection_id, "WebSocket connection closed cleanly"),
            Err(e) => warn!(connection_id = %connection_id, error = %e, "WebSocket connection error"),
        }

        self.disconnect(&connection_id).await;
    }

    /// Resolves the session, decodes the event and routes it to its service
    pub async fn dispatch(&self, connection_id: &str, raw: &str) -> Result<(), AppError> {
        let session = self.sessions.resolve(connection_id).await?;
        let event = ClientEvent::parse(raw)?;

        debug!(
            connection_id = %connection_id,
            user_id = %session.user_id(),
            event = event.kind(),
            room_id = %event.room_id(),
            "Dispatching client event"
        );

        match event {
            ClientEvent::Join { room_id } => {
                self.rooms.join(&session, &room_id).await?;
            }
            ClientEvent::Send { room_id, content } => {
                self.pipeline.send(&session, &room_id, content).await?;
            }
            ClientEvent::Typing { room_id, is_typing } => {
                self.typing.set_typing(&session, &room_id, is_typing).await?;
            }
            ClientEvent::MarkRead {
                room_id,
                message_id,
            } => {
                self.receipts
                    .mark_read(&session, &room_id, &message_id)
                    .await?;
            }
            ClientEvent::Leave { room_id } => {
                self.rooms.leave(&session, &room_id).await?;
            }
            ClientEvent::Invite { room_id, user_ids } => {
                self.invitations
                    .invite(&session.identity, &room_id, user_ids)
                    .await?;
            }
        }

        Ok(())
    }

    /// Tears down a connection: session, outbound channel, live subscriptions,
    /// then the persisted leave for every room it had joined.
    /// Only the first call for a connection does anything.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, connection_id: &str) {
        let Some(session) = self.sessions.unregister(connection_id).await else {
            debug!(connection_id = %connection_id, "Disconnect already handled");
            return;
        };

        self.connections.remove_connection(connection_id).await;
        let rooms = self.rooms.drop_connection(connection_id).await;

        for room_id in &rooms {
            self.leave_with_retry(&session, room_id).await;
        }

        info!(
            connection_id = %connection_id,
            user_id = %session.user_id(),
            rooms = rooms.len(),
            "Connection cleaned up"
        );
    }

    async fn leave_with_retry(&self, session: &Session, room_id: &str) {
        let attempts = self.cleanup_retry_attempts.max(1);

        for attempt in 1..=attempts {
            match self.rooms.leave_on_disconnect(session, room_id).await {
                Ok(()) => return,
                Err(AppError::NotFound(_)) => {
                    debug!(room_id = %room_id, "Room gone, nothing to clean up");
                    return;
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        room_id = %room_id,
                        user_id = %session.user_id(),
                        attempt = attempt,
                        error = %e,
                        "Disconnect cleanup failed, retrying"
                    );
                    let backoff = CLEANUP_BACKOFF_BASE_MS * 2u64.pow(attempt - 1);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => {
                    error!(
                        room_id = %room_id,
                        user_id = %session.user_id(),
                        attempts = attempts,
                        error = %e,
                        "Durability gap: user remains a persisted participant after disconnect"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl MessageHandler for ConnectionCoordinator {
    async fn handle_message(&self, connection_id: &str, message: String) {
        if let Err(e) = self.dispatch(connection_id, &message).await {
            warn!(
                connection_id = %connection_id,
                code = e.code(),
                error = %e,
                "Client event rejected"
            );
            // Reported to the originating connection only
            self.broadcaster
                .send_to_connection(connection_id, &WebSocketMessage::error(&e))
                .await;
        }
    }
}
