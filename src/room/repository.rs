use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::RoomModel;
use crate::shared::AppError;

/// Trait for room repository operations.
///
/// `save_participants` replaces the whole set. Callers serialize the
/// read-modify-write around it per room.
#[async_trait]
pub trait RoomRepository {
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError>;
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError>;
    async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError>;

    /// Returns false if the room does not exist
    async fn save_participants(
        &self,
        room_id: &str,
        participants: &BTreeSet<String>,
    ) -> Result<bool, AppError>;
}

/// In-memory implementation of RoomRepository for development and testing
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<String, RoomModel>>,
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    fn rooms(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, RoomModel>>, AppError> {
        self.rooms.lock().map_err(|_| {
            warn!("Room store lock poisoned");
            AppError::PersistenceFailed("Room store unavailable".to_string())
        })
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self, room))]
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError> {
        debug!(room_id = %room.id, creator_id = %room.creator_id, "Creating room in memory");

        let mut rooms = self.rooms()?;
        if rooms.contains_key(&room.id) {
            warn!(room_id = %room.id, "Room already exists in memory");
            return Err(AppError::PersistenceFailed(
                "Room already exists".to_string(),
            ));
        }
        rooms.insert(room.id.clone(), room.clone());

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError> {
        let room = self.rooms()?.get(room_id).cloned();

        match &room {
            Some(r) => debug!(room_id = %room_id, participants = r.participant_count(), "Room found in memory"),
            None => debug!(room_id = %room_id, "Room not found in memory"),
        }

        Ok(room)
    }

    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        let mut rooms: Vec<RoomModel> = self.rooms()?.values().cloned().collect();
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        debug!(room_count = rooms.len(), "Rooms listed from memory");
        Ok(rooms)
    }

    #[instrument(skip(self, participants))]
    async fn save_participants(
        &self,
        room_id: &str,
        participants: &BTreeSet<String>,
    ) -> Result<bool, AppError> {
        let mut rooms = self.rooms()?;

        match rooms.get_mut(room_id) {
            Some(room) => {
                room.participants = participants.clone();
                debug!(room_id = %room_id, participants = participants.len(), "Participants saved in memory");
                Ok(true)
            }
            None => {
                debug!(room_id = %room_id, "Room not found for participant update");
                Ok(false)
            }
        }
    }
}

/// PostgreSQL implementation of room repository
pub struct PostgresRoomRepository {
    pool: PgPool,
}

impl PostgresRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn room_from_row(row: &PgRow) -> RoomModel {
        let participants: Vec<String> = row.get("participants");
        RoomModel {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            creator_id: row.get("creator_id"),
            participants: participants.into_iter().collect(),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl RoomRepository for PostgresRoomRepository {
    #[instrument(skip(self, room))]
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError> {
        debug!(room_id = %room.id, creator_id = %room.creator_id, "Creating room in database");

        sqlx::query(
            "INSERT INTO rooms (id, name, description, creator_id, participants, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&room.id)
        .bind(&room.name)
        .bind(&room.description)
        .bind(&room.creator_id)
        .bind(room.participant_ids())
        .bind(room.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, room_id = %room.id, "Failed to create room in database");
            AppError::PersistenceFailed(e.to_string())
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, description, creator_id, participants, created_at FROM rooms WHERE id = $1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, room_id = %room_id, "Failed to fetch room from database");
            AppError::PersistenceFailed(e.to_string())
        })?;

        Ok(row.as_ref().map(Self::room_from_row))
    }

    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, description, creator_id, participants, created_at FROM rooms ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to list rooms from database");
            AppError::PersistenceFailed(e.to_string())
        })?;

        debug!(room_count = rows.len(), "Rooms listed from database");
        Ok(rows.iter().map(Self::room_from_row).collect())
    }

    #[instrument(skip(self, participants))]
    async fn save_participants(
        &self,
        room_id: &str,
        participants: &BTreeSet<String>,
    ) -> Result<bool, AppError> {
        let ids: Vec<String> = participants.iter().cloned().collect();

        let result = sqlx::query("UPDATE rooms SET participants = $2 WHERE id = $1")
            .bind(room_id)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, room_id = %room_id, "Failed to save participants");
                AppError::PersistenceFailed(e.to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }
}
