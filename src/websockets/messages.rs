use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::error;

use crate::message::models::{FileAttachment, MessageContent, MessageModel};
use crate::room::types::ParticipantView;
use crate::shared::AppError;

/// Message types for WebSocket communication
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    // Client -> Server
    JoinRoom,
    SendMessage,
    MarkAsRead,
    LeaveRoom,
    Invite,

    // Both directions
    TypingStatus,

    // Server -> Client
    RoomUsersUpdated,
    ReceiveMessage,
    MessageRead,
    RoomInvitation,
    Ready,
    Error,
}

/// Metadata for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessageMeta {
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
}

/// Base structure for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub meta: Option<WebSocketMessageMeta>,
}

/// Client-to-Server message payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRefPayload {
    pub room_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessagePayload {
    pub room_id: String,
    pub text: String,
    #[serde(default)]
    pub file: Option<FileAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingPayload {
    pub room_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkAsReadPayload {
    pub room_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitePayload {
    pub room_id: String,
    pub user_ids: Vec<String>,
}

/// Server-to-Client message payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomUsersUpdatedPayload {
    pub room_id: String,
    pub participants: Vec<ParticipantView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingStatusPayload {
    pub room_id: String,
    pub user_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReadPayload {
    pub room_id: String,
    pub message_id: String,
    pub user_id: String,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInvitationPayload {
    pub room_id: String,
    pub room_name: String,
    pub invited_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyPayload {
    pub user_id: String,
    pub username: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// Helper functions for creating messages
impl WebSocketMessage {
    pub fn new(message_type: MessageType, payload: serde_json::Value) -> Self {
        Self {
            message_type,
            payload,
            meta: Some(WebSocketMessageMeta {
                timestamp: Utc::now(),
                user_id: None,
            }),
        }
    }

    fn with_payload<T: Serialize>(message_type: MessageType, payload: &T) -> Self {
        let value = serde_json::to_value(payload).unwrap_or_else(|e| {
            error!(message_type = ?message_type, error = %e, "Failed to serialize payload");
            serde_json::Value::Null
        });
        Self::new(message_type, value)
    }

    /// Attributes the message to a user in `meta`
    pub fn from_user(mut self, user_id: &str) -> Self {
        if let Some(meta) = self.meta.as_mut() {
            meta.user_id = Some(user_id.to_string());
        }
        self
    }

    /// Create a ROOM_USERS_UPDATED message
    pub fn room_users_updated(room_id: &str, participants: Vec<ParticipantView>) -> Self {
        Self::with_payload(
            MessageType::RoomUsersUpdated,
            &RoomUsersUpdatedPayload {
                room_id: room_id.to_string(),
                participants,
            },
        )
    }

    /// Create a RECEIVE_MESSAGE message carrying the persisted document
    pub fn receive_message(message: &MessageModel) -> Self {
        Self::with_payload(MessageType::ReceiveMessage, message).from_user(&message.sender_id)
    }

    pub fn typing_status(room_id: &str, user_id: &str, is_typing: bool) -> Self {
        Self::with_payload(
            MessageType::TypingStatus,
            &TypingStatusPayload {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
                is_typing,
            },
        )
        .from_user(user_id)
    }

    pub fn message_read(
        room_id: &str,
        message_id: &str,
        user_id: &str,
        read_at: DateTime<Utc>,
    ) -> Self {
        Self::with_payload(
            MessageType::MessageRead,
            &MessageReadPayload {
                room_id: room_id.to_string(),
                message_id: message_id.to_string(),
                user_id: user_id.to_string(),
                read_at,
            },
        )
    }

    pub fn room_invitation(room_id: &str, room_name: &str, invited_by: &str) -> Self {
        Self::with_payload(
            MessageType::RoomInvitation,
            &RoomInvitationPayload {
                room_id: room_id.to_string(),
                room_name: room_name.to_string(),
                invited_by: invited_by.to_string(),
            },
        )
    }

    pub fn ready(user_id: &str, username: &str, session_id: &str) -> Self {
        Self::with_payload(
            MessageType::Ready,
            &ReadyPayload {
                user_id: user_id.to_string(),
                username: username.to_string(),
                session_id: session_id.to_string(),
            },
        )
    }

    /// Create an ERROR message from an application error
    pub fn error(err: &AppError) -> Self {
        Self::with_payload(
            MessageType::Error,
            &ErrorPayload {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        )
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(|e| {
            error!(error = %e, "Failed to serialize WebSocket message");
            AppError::Internal
        })
    }

    fn payload_as<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            AppError::ValidationFailed(format!(
                "Invalid {:?} payload: {}",
                self.message_type, e
            ))
        })
    }
}

/// An inbound event from a client, decoded from its envelope
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Join { room_id: String },
    Send { room_id: String, content: MessageContent },
    Typing { room_id: String, is_typing: bool },
    MarkRead { room_id: String, message_id: String },
    Leave { room_id: String },
    Invite { room_id: String, user_ids: Vec<String> },
}

impl ClientEvent {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let envelope: WebSocketMessage = serde_json::from_str(raw)
            .map_err(|e| AppError::ValidationFailed(format!("Malformed message: {}", e)))?;

        let event = match envelope.message_type {
            MessageType::JoinRoom => {
                let p: RoomRefPayload = envelope.payload_as()?;
                ClientEvent::Join { room_id: p.room_id }
            }
            MessageType::SendMessage => {
                let p: SendMessagePayload = envelope.payload_as()?;
                ClientEvent::Send {
                    room_id: p.room_id,
                    content: MessageContent::new(p.text, p.file),
                }
            }
            MessageType::TypingStatus => {
                let p: TypingPayload = envelope.payload_as()?;
                ClientEvent::Typing {
                    room_id: p.room_id,
                    is_typing: p.is_typing,
                }
            }
            MessageType::MarkAsRead => {
                let p: MarkAsReadPayload = envelope.payload_as()?;
                ClientEvent::MarkRead {
                    room_id: p.room_id,
                    message_id: p.message_id,
                }
            }
            MessageType::LeaveRoom => {
                let p: RoomRefPayload = envelope.payload_as()?;
                ClientEvent::Leave { room_id: p.room_id }
            }
            MessageType::Invite => {
                let p: InvitePayload = envelope.payload_as()?;
                ClientEvent::Invite {
                    room_id: p.room_id,
                    user_ids: p.user_ids,
                }
            }
            other => {
                return Err(AppError::ValidationFailed(format!(
                    "Unsupported message type {:?}",
                    other
                )))
            }
        };

        if event.room_id().trim().is_empty() {
            return Err(AppError::ValidationFailed("room_id is required".to_string()));
        }
        Ok(event)
    }

    pub fn room_id(&self) -> &str {
        match self {
            ClientEvent::Join { room_id }
            | ClientEvent::Send { room_id, .. }
            | ClientEvent::Typing { room_id, .. }
            | ClientEvent::MarkRead { room_id, .. }
            | ClientEvent::Leave { room_id }
            | ClientEvent::Invite { room_id, .. } => room_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::Join { .. } => "join",
            ClientEvent::Send { .. } => "send",
            ClientEvent::Typing { .. } => "typing",
            ClientEvent::MarkRead { .. } => "mark_read",
            ClientEvent::Leave { .. } => "leave",
            ClientEvent::Invite { .. } => "invite",
        }
    }
}
