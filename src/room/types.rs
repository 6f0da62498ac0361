use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::models::RoomModel;

/// Request payload for creating a new room
#[derive(Debug, Deserialize)]
pub struct RoomCreateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request payload for inviting users to a room
#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub user_ids: Vec<String>,
}

/// A participant as shown to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantView {
    pub user_id: String,
    /// Absent when the server has never seen this user authenticate
    pub username: Option<String>,
}

impl ParticipantView {
    pub fn from_room(room: &RoomModel, names: &HashMap<String, String>) -> Vec<Self> {
        room.participants
            .iter()
            .map(|user_id| ParticipantView {
                user_id: user_id.clone(),
                username: names.get(user_id).cloned(),
            })
            .collect()
    }
}

/// Response for room creation and room information
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: String,
    pub participants: Vec<ParticipantView>,
    pub created_at: DateTime<Utc>,
}

impl RoomResponse {
    pub fn from_room(room: &RoomModel, names: &HashMap<String, String>) -> Self {
        Self {
            id: room.id.clone(),
            name: room.name.clone(),
            description: room.description.clone(),
            creator_id: room.creator_id.clone(),
            participants: ParticipantView::from_room(room, names),
            created_at: room.created_at,
        }
    }
}
