#![allow(dead_code)] // Not every test file uses every mock

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, RwLock};

use roomchat::{
    message::{
        models::{MessageModel, NewMessage, ReadOutcome},
        repository::{InMemoryMessageRepository, MessageRepository},
    },
    room::{
        models::RoomModel,
        repository::{InMemoryRoomRepository, RoomRepository},
    },
    websockets::{SocketError, SocketWrapper},
    AppError, ConnectionManager,
};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Records every frame per connection instead of writing to a socket.
/// Frames for connections that are not (or no longer) registered are dropped,
/// like sends to a closed channel. Registered senders are held, not used, so
/// a connection's outbound channel stays open until it is removed.
#[derive(Clone, Default)]
pub struct MockConnectionManager {
    sent_messages: Arc<RwLock<HashMap<String, VecDeque<String>>>>,
    connected: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<String>>>>,
}

impl MockConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_messages_for(&self, connection_id: &str) -> Vec<String> {
        self.sent_messages
            .read()
            .await
            .get(connection_id)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn consume_message_for(&self, connection_id: &str) -> Option<String> {
        self.sent_messages
            .write()
            .await
            .get_mut(connection_id)
            .and_then(|queue| queue.pop_front())
    }

    pub async fn clear_messages(&self) {
        self.sent_messages.write().await.clear();
    }

    pub async fn is_connected(&self, connection_id: &str) -> bool {
        self.connected.read().await.contains_key(connection_id)
    }
}

#[async_trait]
impl ConnectionManager for MockConnectionManager {
    async fn add_connection(&self, connection_id: String, sender: mpsc::UnboundedSender<String>) {
        self.connected.write().await.insert(connection_id, sender);
    }

    async fn remove_connection(&self, connection_id: &str) {
        self.connected.write().await.remove(connection_id);
    }

    async fn send_to_connection(&self, connection_id: &str, message: &str) {
        if !self.is_connected(connection_id).await {
            return;
        }
        self.sent_messages
            .write()
            .await
            .entry(connection_id.to_string())
            .or_default()
            .push_back(message.to_string());
    }

    async fn send_to_connections(&self, connection_ids: &[String], message: &str) {
        for connection_id in connection_ids {
            self.send_to_connection(connection_id, message).await;
        }
    }

    async fn connection_count(&self) -> usize {
        self.connected.read().await.len()
    }
}

/// Message store whose writes always fail
#[derive(Default)]
pub struct FailingMessageRepository {
    inner: InMemoryMessageRepository,
}

#[async_trait]
impl MessageRepository for FailingMessageRepository {
    async fn insert_message(&self, _message: NewMessage) -> Result<MessageModel, AppError> {
        Err(AppError::PersistenceFailed("store unavailable".to_string()))
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<MessageModel>, AppError> {
        self.inner.get_message(message_id).await
    }

    async fn list_recent(&self, room_id: &str, limit: i64) -> Result<Vec<MessageModel>, AppError> {
        self.inner.list_recent(room_id, limit).await
    }

    async fn append_read_receipt(
        &self,
        _message_id: &str,
        _user_id: &str,
        _read_at: DateTime<Utc>,
    ) -> Result<ReadOutcome, AppError> {
        Err(AppError::PersistenceFailed("store unavailable".to_string()))
    }
}

/// Message store whose inserts block until the test releases them
#[derive(Default)]
pub struct GatedMessageRepository {
    inner: InMemoryMessageRepository,
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl MessageRepository for GatedMessageRepository {
    async fn insert_message(&self, message: NewMessage) -> Result<MessageModel, AppError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.insert_message(message).await
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<MessageModel>, AppError> {
        self.inner.get_message(message_id).await
    }

    async fn list_recent(&self, room_id: &str, limit: i64) -> Result<Vec<MessageModel>, AppError> {
        self.inner.list_recent(room_id, limit).await
    }

    async fn append_read_receipt(
        &self,
        message_id: &str,
        user_id: &str,
        read_at: DateTime<Utc>,
    ) -> Result<ReadOutcome, AppError> {
        self.inner
            .append_read_receipt(message_id, user_id, read_at)
            .await
    }
}

/// Room store whose first `failures` participant writes fail
pub struct FlakyRoomRepository {
    inner: InMemoryRoomRepository,
    failures_left: AtomicUsize,
    pub save_calls: AtomicUsize,
}

impl FlakyRoomRepository {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryRoomRepository::new(),
            failures_left: AtomicUsize::new(failures),
            save_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_next(&self, failures: usize) {
        self.failures_left.store(failures, Ordering::SeqCst);
    }
}

#[async_trait]
impl RoomRepository for FlakyRoomRepository {
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError> {
        self.inner.create_room(room).await
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError> {
        self.inner.get_room(room_id).await
    }

    async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        self.inner.list_rooms().await
    }

    async fn save_participants(
        &self,
        room_id: &str,
        participants: &BTreeSet<String>,
    ) -> Result<bool, AppError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::PersistenceFailed("write conflict".to_string()));
        }
        self.inner.save_participants(room_id, participants).await
    }
}

/// Socket driven by a channel of inbound frames; closing the channel closes the socket
pub struct ScriptedSocket {
    inbound: mpsc::UnboundedReceiver<String>,
}

impl ScriptedSocket {
    pub fn pair() -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { inbound: rx }, tx)
    }
}

#[async_trait]
impl SocketWrapper for ScriptedSocket {
    async fn send_message(&mut self, _message: String) -> Result<(), SocketError> {
        Ok(())
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        Ok(())
    }
}
