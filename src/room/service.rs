use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    locks::KeyedLocks,
    models::RoomModel,
    repository::RoomRepository,
    subscribers::{Subscriber, SubscriberRegistry},
    types::{ParticipantView, RoomCreateRequest, RoomResponse},
};
use crate::{
    session::{Identity, Session},
    shared::AppError,
    user::UserDirectory,
    websockets::{MessageBroadcaster, WebSocketMessage},
};

/// Owns the persisted participant set and the live subscriber set of every room.
///
/// All participant mutations (join, leave, invite, disconnect cleanup) hold the
/// room's lock across the read-modify-write. A user stays a participant while
/// any of their connections is subscribed; subscription changes happen under the
/// same lock so that check cannot race. Participant broadcasts are sequenced
/// per room by a separate lock and always built from a fresh read.
pub struct RoomService {
    repository: Arc<dyn RoomRepository + Send + Sync>,
    subscribers: Arc<SubscriberRegistry>,
    directory: Arc<dyn UserDirectory>,
    broadcaster: MessageBroadcaster,
    room_locks: KeyedLocks,
    broadcast_locks: KeyedLocks,
}

impl RoomService {
    pub fn new(
        repository: Arc<dyn RoomRepository + Send + Sync>,
        subscribers: Arc<SubscriberRegistry>,
        directory: Arc<dyn UserDirectory>,
        broadcaster: MessageBroadcaster,
    ) -> Self {
        Self {
            repository,
            subscribers,
            directory,
            broadcaster,
            room_locks: KeyedLocks::new(),
            broadcast_locks: KeyedLocks::new(),
        }
    }

    /// Creates a new room with a generated ID; the creator is its first participant
    #[instrument(skip(self, creator, request), fields(creator_id = %creator.user_id))]
    pub async fn create_room(
        &self,
        creator: &Identity,
        request: RoomCreateRequest,
    ) -> Result<RoomResponse, AppError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::ValidationFailed(
                "Room name is required".to_string(),
            ));
        }
        let description = request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let room = RoomModel::new(name, description, creator.user_id.clone());
        self.directory
            .remember(&creator.user_id, &creator.username)
            .await;
        self.repository.create_room(&room).await?;

        info!(room_id = %room.id, room_name = %room.name, "Room created");
        Ok(self.room_response(&room).await)
    }

    #[instrument(skip(self))]
    pub async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError> {
        self.repository.get_room(room_id).await
    }

    /// Like `get_room`, but a missing room is `NotFound`
    pub async fn require_room(&self, room_id: &str) -> Result<RoomModel, AppError> {
        self.repository
            .get_room(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", room_id)))
    }

    #[instrument(skip(self))]
    pub async fn list_rooms(&self) -> Result<Vec<RoomResponse>, AppError> {
        let rooms = self.repository.list_rooms().await?;
        debug!(room_count = rooms.len(), "Rooms retrieved");

        let mut responses = Vec::with_capacity(rooms.len());
        for room in &rooms {
            responses.push(self.room_response(room).await);
        }
        Ok(responses)
    }

    /// Persists the user as a participant, subscribes the connection and
    /// broadcasts the participant list. Re-joining refreshes the subscription.
    #[instrument(skip(self, session), fields(user_id = %session.user_id(), connection_id = %session.connection_id))]
    pub async fn join(&self, session: &Session, room_id: &str) -> Result<RoomModel, AppError> {
        let (room, added) = {
            let _guard = self.room_locks.acquire(room_id).await;
            let outcome = self
                .union_participants(room_id, &[session.user_id().to_string()])
                .await?;
            self.subscribers
                .subscribe(room_id, &session.connection_id, session.user_id())
                .await;
            outcome
        };

        info!(
            room_id = %room_id,
            newly_added = !added.is_empty(),
            participants = room.participant_count(),
            "User joined room"
        );

        self.broadcast_participants(room_id).await;
        Ok(room)
    }

    /// Unsubscribes the connection, removes the user from the participant set
    /// unless another of their connections is still in the room, and
    /// broadcasts the new list to whoever is still subscribed
    #[instrument(skip(self, session), fields(user_id = %session.user_id(), connection_id = %session.connection_id))]
    pub async fn leave(&self, session: &Session, room_id: &str) -> Result<RoomModel, AppError> {
        let (room, removed) = {
            let _guard = self.room_locks.acquire(room_id).await;
            self.subscribers
                .unsubscribe(room_id, &session.connection_id)
                .await;
            self.exclude_participant(room_id, session.user_id()).await?
        };

        info!(room_id = %room_id, removed = removed, "User left room");

        self.broadcast_participants(room_id).await;
        Ok(room)
    }

    /// Leave for a connection that is already gone: its subscriptions were
    /// dropped wholesale, so only the persisted removal and broadcast remain
    #[instrument(skip(self, session), fields(user_id = %session.user_id(), connection_id = %session.connection_id))]
    pub async fn leave_on_disconnect(&self, session: &Session, room_id: &str) -> Result<(), AppError> {
        let (_, removed) = self.remove_participant(room_id, session.user_id()).await?;

        debug!(room_id = %room_id, removed = removed, "Disconnect cleanup applied to room");

        self.broadcast_participants(room_id).await;
        Ok(())
    }

    /// Serialized set union against the room's persisted participants.
    /// Returns the updated room and the ids that were not already present.
    #[instrument(skip(self, user_ids))]
    pub async fn add_participants(
        &self,
        room_id: &str,
        user_ids: &[String],
    ) -> Result<(RoomModel, Vec<String>), AppError> {
        let _guard = self.room_locks.acquire(room_id).await;
        self.union_participants(room_id, user_ids).await
    }

    /// Serialized removal from the room's persisted participants.
    /// Returns the updated room and whether the user was removed; a user with
    /// a connection still subscribed to the room is kept.
    #[instrument(skip(self))]
    pub async fn remove_participant(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> Result<(RoomModel, bool), AppError> {
        let _guard = self.room_locks.acquire(room_id).await;
        self.exclude_participant(room_id, user_id).await
    }

    // Callers hold the room lock
    async fn union_participants(
        &self,
        room_id: &str,
        user_ids: &[String],
    ) -> Result<(RoomModel, Vec<String>), AppError> {
        let mut room = self.require_room(room_id).await?;
        let mut added = Vec::new();
        for user_id in user_ids {
            if room.participants.insert(user_id.clone()) {
                added.push(user_id.clone());
            }
        }

        if !added.is_empty() {
            self.save_participants(&room).await?;
        }

        Ok((room, added))
    }

    // Callers hold the room lock
    async fn exclude_participant(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> Result<(RoomModel, bool), AppError> {
        let mut room = self.require_room(room_id).await?;

        if self.subscribers.has_user(room_id, user_id).await {
            debug!(
                room_id = %room_id,
                user_id = %user_id,
                "User still subscribed on another connection, keeping participant"
            );
            return Ok((room, false));
        }

        let removed = room.participants.remove(user_id);
        if removed {
            self.save_participants(&room).await?;
        }

        Ok((room, removed))
    }

    async fn save_participants(&self, room: &RoomModel) -> Result<(), AppError> {
        let saved = self
            .repository
            .save_participants(&room.id, &room.participants)
            .await
            .map_err(|e| {
                warn!(room_id = %room.id, error = %e, "Failed to persist participants");
                e
            })?;

        if !saved {
            return Err(AppError::NotFound(format!("Room {} not found", room.id)));
        }
        Ok(())
    }

    pub async fn current_subscribers(&self, room_id: &str) -> Vec<Subscriber> {
        self.subscribers.subscribers(room_id).await
    }

    pub async fn subscriber_connections(&self, room_id: &str) -> Vec<String> {
        self.current_subscribers(room_id)
            .await
            .into_iter()
            .map(|s| s.connection_id)
            .collect()
    }

    pub async fn is_subscribed(&self, room_id: &str, connection_id: &str) -> bool {
        self.subscribers.is_subscribed(room_id, connection_id).await
    }

    /// Drops every live subscription of a connection, returning the rooms it had joined
    pub async fn drop_connection(&self, connection_id: &str) -> Vec<String> {
        self.subscribers.remove_connection(connection_id).await
    }

    /// Sends ROOM_USERS_UPDATED to the room's current subscribers.
    ///
    /// Frames for one room are read and enqueued one at a time, each from the
    /// persisted set at that moment, so the last frame a subscriber holds
    /// always matches the latest membership change.
    pub async fn broadcast_participants(&self, room_id: &str) {
        let _turn = self.broadcast_locks.acquire(room_id).await;

        let room = match self.require_room(room_id).await {
            Ok(room) => room,
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "Skipping participant broadcast");
                return;
            }
        };

        let names = self.directory.display_names(&room.participant_ids()).await;
        let message =
            WebSocketMessage::room_users_updated(&room.id, ParticipantView::from_room(&room, &names));

        let connections = self.subscriber_connections(&room.id).await;
        self.broadcaster.broadcast(&connections, &message).await;
    }

    pub async fn room_response(&self, room: &RoomModel) -> RoomResponse {
        let names = self.directory.display_names(&room.participant_ids()).await;
        RoomResponse::from_room(room, &names)
    }
}
