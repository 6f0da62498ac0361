use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::AppError;

/// Optional file reference carried alongside message text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileAttachment {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadReceipt {
    pub user_id: String,
    pub read_at: DateTime<Utc>,
}

/// Persisted message document, as echoed back by the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageModel {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    /// Denormalized display name of the sender at send time
    pub sender_name: String,
    pub text: String,
    pub file: Option<FileAttachment>,
    pub created_at: DateTime<Utc>,
    pub is_edited: bool,
    /// Each user appears at most once
    pub read_by: Vec<ReadReceipt>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MessageModel {
    pub fn has_read(&self, user_id: &str) -> bool {
        self.read_by.iter().any(|receipt| receipt.user_id == user_id)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A message ready to be persisted. Id and timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub room_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub file: Option<FileAttachment>,
}

/// Result of the store's append-if-absent read receipt primitive
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// Receipt recorded, returns the updated message
    Appended(MessageModel),
    /// The user had already read this message; nothing changed
    AlreadyRead,
    MessageNotFound,
}

/// Client-supplied message body
#[derive(Debug, Clone, PartialEq)]
pub struct MessageContent {
    pub text: String,
    pub file: Option<FileAttachment>,
}

impl MessageContent {
    pub fn new(text: impl Into<String>, file: Option<FileAttachment>) -> Self {
        Self {
            text: text.into(),
            file,
        }
    }

    /// Trims the text and attachment fields; the text must be non-empty and
    /// within `max_length` characters, an attachment must keep a url
    pub fn validate(self, max_length: usize) -> Result<Self, AppError> {
        let text = self.text.trim().to_string();

        if text.is_empty() {
            return Err(AppError::ValidationFailed(
                "Message text is required".to_string(),
            ));
        }
        if text.chars().count() > max_length {
            return Err(AppError::ValidationFailed(format!(
                "Message text exceeds {} characters",
                max_length
            )));
        }
        let file = match self.file {
            Some(file) => {
                let url = file.url.trim().to_string();
                if url.is_empty() {
                    return Err(AppError::ValidationFailed(
                        "File attachment url is required".to_string(),
                    ));
                }
                Some(FileAttachment {
                    url,
                    name: trimmed(file.name),
                    file_type: trimmed(file.file_type),
                })
            }
            None => None,
        };

        Ok(Self { text, file })
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
