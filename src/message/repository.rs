use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::models::{FileAttachment, MessageModel, NewMessage, ReadOutcome, ReadReceipt};
use crate::shared::AppError;

/// Trait for message repository operations
#[async_trait]
pub trait MessageRepository {
    /// Persists a message, assigning its id and creation timestamp
    async fn insert_message(&self, message: NewMessage) -> Result<MessageModel, AppError>;

    async fn get_message(&self, message_id: &str) -> Result<Option<MessageModel>, AppError>;

    /// The newest `limit` non-deleted messages of a room, oldest first
    async fn list_recent(&self, room_id: &str, limit: i64) -> Result<Vec<MessageModel>, AppError>;

    /// Appends `(user_id, read_at)` unless the user already appears in the read-by list.
    /// The check and the write are one atomic step.
    async fn append_read_receipt(
        &self,
        message_id: &str,
        user_id: &str,
        read_at: DateTime<Utc>,
    ) -> Result<ReadOutcome, AppError>;
}

#[derive(Default)]
struct MessageTables {
    messages: HashMap<String, MessageModel>,
    // room_id -> message ids in creation order
    by_room: HashMap<String, Vec<String>>,
}

/// In-memory implementation of MessageRepository for development and testing
#[derive(Default)]
pub struct InMemoryMessageRepository {
    tables: Mutex<MessageTables>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<std::sync::MutexGuard<'_, MessageTables>, AppError> {
        self.tables.lock().map_err(|_| {
            warn!("Message store lock poisoned");
            AppError::PersistenceFailed("Message store unavailable".to_string())
        })
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    #[instrument(skip(self, message), fields(room_id = %message.room_id, sender_id = %message.sender_id))]
    async fn insert_message(&self, message: NewMessage) -> Result<MessageModel, AppError> {
        let mut tables = self.tables()?;

        // Timestamps are strictly increasing within a room
        let last = tables
            .by_room
            .get(&message.room_id)
            .and_then(|ids| ids.last())
            .and_then(|id| tables.messages.get(id))
            .map(|m| m.created_at);
        let now = Utc::now();
        let created_at = match last {
            Some(last) if last >= now => last + Duration::microseconds(1),
            _ => now,
        };

        let model = MessageModel {
            id: Uuid::new_v4().to_string(),
            room_id: message.room_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            text: message.text,
            file: message.file,
            created_at,
            is_edited: false,
            read_by: Vec::new(),
            deleted_at: None,
        };

        tables
            .by_room
            .entry(model.room_id.clone())
            .or_default()
            .push(model.id.clone());
        tables.messages.insert(model.id.clone(), model.clone());

        debug!(message_id = %model.id, "Message stored in memory");
        Ok(model)
    }

    #[instrument(skip(self))]
    async fn get_message(&self, message_id: &str) -> Result<Option<MessageModel>, AppError> {
        Ok(self.tables()?.messages.get(message_id).cloned())
    }

    #[instrument(skip(self))]
    async fn list_recent(&self, room_id: &str, limit: i64) -> Result<Vec<MessageModel>, AppError> {
        let tables = self.tables()?;
        let limit = usize::try_from(limit).unwrap_or(0);

        let mut recent: Vec<MessageModel> = tables
            .by_room
            .get(room_id)
            .map(|ids| {
                ids.iter()
                    .rev()
                    .filter_map(|id| tables.messages.get(id))
                    .filter(|m| !m.is_deleted())
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        recent.reverse();

        Ok(recent)
    }

    #[instrument(skip(self))]
    async fn append_read_receipt(
        &self,
        message_id: &str,
        user_id: &str,
        read_at: DateTime<Utc>,
    ) -> Result<ReadOutcome, AppError> {
        let mut tables = self.tables()?;

        let Some(message) = tables.messages.get_mut(message_id) else {
            return Ok(ReadOutcome::MessageNotFound);
        };
        if message.has_read(user_id) {
            return Ok(ReadOutcome::AlreadyRead);
        }

        message.read_by.push(ReadReceipt {
            user_id: user_id.to_string(),
            read_at,
        });
        Ok(ReadOutcome::Appended(message.clone()))
    }
}

/// PostgreSQL implementation of message repository.
///
/// Read receipts live in `message_reads` keyed by `(message_id, user_id)`,
/// so a duplicate append is rejected by the primary key.
pub struct PostgresMessageRepository {
    pool: PgPool,
}

const MESSAGE_COLUMNS: &str = "id, room_id, sender_id, sender_name, text, file_url, file_name, file_type, created_at, is_edited, deleted_at";

impl PostgresMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn message_from_row(row: &PgRow) -> MessageModel {
        let file_url: Option<String> = row.get("file_url");
        MessageModel {
            id: row.get("id"),
            room_id: row.get("room_id"),
            sender_id: row.get("sender_id"),
            sender_name: row.get("sender_name"),
            text: row.get("text"),
            file: file_url.map(|url| FileAttachment {
                url,
                name: row.get("file_name"),
                file_type: row.get("file_type"),
            }),
            created_at: row.get("created_at"),
            is_edited: row.get("is_edited"),
            read_by: Vec::new(),
            deleted_at: row.get("deleted_at"),
        }
    }

    /// Fills `read_by` for every message in one query
    async fn attach_receipts(&self, messages: &mut [MessageModel]) -> Result<(), AppError> {
        if messages.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();

        let rows = sqlx::query(
            "SELECT message_id, user_id, read_at FROM message_reads WHERE message_id = ANY($1) ORDER BY read_at",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch read receipts");
            AppError::PersistenceFailed(e.to_string())
        })?;

        let mut receipts: HashMap<String, Vec<ReadReceipt>> = HashMap::new();
        for row in rows {
            receipts
                .entry(row.get("message_id"))
                .or_default()
                .push(ReadReceipt {
                    user_id: row.get("user_id"),
                    read_at: row.get("read_at"),
                });
        }
        for message in messages.iter_mut() {
            message.read_by = receipts.remove(&message.id).unwrap_or_default();
        }

        Ok(())
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    #[instrument(skip(self, message), fields(room_id = %message.room_id, sender_id = %message.sender_id))]
    async fn insert_message(&self, message: NewMessage) -> Result<MessageModel, AppError> {
        let id = Uuid::new_v4().to_string();
        let (file_url, file_name, file_type) = match &message.file {
            Some(f) => (Some(f.url.clone()), f.name.clone(), f.file_type.clone()),
            None => (None, None, None),
        };

        let row = sqlx::query(&format!(
            "INSERT INTO messages (id, room_id, sender_id, sender_name, text, file_url, file_name, file_type, created_at, is_edited) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, clock_timestamp(), FALSE) RETURNING {}",
            MESSAGE_COLUMNS
        ))
        .bind(&id)
        .bind(&message.room_id)
        .bind(&message.sender_id)
        .bind(&message.sender_name)
        .bind(&message.text)
        .bind(file_url)
        .bind(file_name)
        .bind(file_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to insert message");
            AppError::PersistenceFailed(e.to_string())
        })?;

        debug!(message_id = %id, "Message stored in database");
        Ok(Self::message_from_row(&row))
    }

    #[instrument(skip(self))]
    async fn get_message(&self, message_id: &str) -> Result<Option<MessageModel>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM messages WHERE id = $1",
            MESSAGE_COLUMNS
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, message_id = %message_id, "Failed to fetch message");
            AppError::PersistenceFailed(e.to_string())
        })?;

        match row {
            Some(row) => {
                let mut messages = [Self::message_from_row(&row)];
                self.attach_receipts(&mut messages).await?;
                let [message] = messages;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn list_recent(&self, room_id: &str, limit: i64) -> Result<Vec<MessageModel>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM messages WHERE room_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC LIMIT $2",
            MESSAGE_COLUMNS
        ))
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, room_id = %room_id, "Failed to list messages");
            AppError::PersistenceFailed(e.to_string())
        })?;

        let mut messages: Vec<MessageModel> = rows.iter().rev().map(Self::message_from_row).collect();
        self.attach_receipts(&mut messages).await?;
        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn append_read_receipt(
        &self,
        message_id: &str,
        user_id: &str,
        read_at: DateTime<Utc>,
    ) -> Result<ReadOutcome, AppError> {
        let result = sqlx::query(
            "INSERT INTO message_reads (message_id, user_id, read_at) \
             SELECT id, $2, $3 FROM messages WHERE id = $1 \
             ON CONFLICT (message_id, user_id) DO NOTHING",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(read_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, message_id = %message_id, "Failed to append read receipt");
            AppError::PersistenceFailed(e.to_string())
        })?;

        if result.rows_affected() > 0 {
            return match self.get_message(message_id).await? {
                Some(message) => Ok(ReadOutcome::Appended(message)),
                None => Ok(ReadOutcome::MessageNotFound),
            };
        }

        // Nothing inserted: either the message is missing or the receipt already exists
        match self.get_message(message_id).await? {
            Some(_) => Ok(ReadOutcome::AlreadyRead),
            None => Ok(ReadOutcome::MessageNotFound),
        }
    }
}
