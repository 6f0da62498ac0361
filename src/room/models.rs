use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Persisted room document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomModel {
    pub id: String, // Random pet name generated ID
    pub name: String,
    pub description: Option<String>,
    pub creator_id: String,
    /// Persisted membership intent. A set: a user appears at most once.
    pub participants: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl RoomModel {
    /// Creates a new room model with generated ID. The creator is the first participant.
    pub fn new(name: String, description: Option<String>, creator_id: String) -> Self {
        let room_id = petname::Petnames::default().generate_one(3, "-");

        let mut participants = BTreeSet::new();
        participants.insert(creator_id.clone());

        Self {
            id: room_id,
            name,
            description,
            creator_id,
            participants,
            created_at: Utc::now(),
        }
    }

    /// Check if a user is a participant of this room
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.contains(user_id)
    }

    pub fn participant_ids(&self) -> Vec<String> {
        self.participants.iter().cloned().collect()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }
}
