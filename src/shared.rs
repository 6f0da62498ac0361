use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::invitation::InvitationRelay;
use crate::message::{
    pipeline::MessagePipeline, receipts::ReadReceiptTracker, repository::MessageRepository,
};
use crate::presence::TypingBroadcaster;
use crate::room::{repository::RoomRepository, service::RoomService, SubscriberRegistry};
use crate::session::{Authenticator, SessionRegistry};
use crate::user::{InMemoryUserDirectory, UserDirectory};
use crate::websockets::{ConnectionCoordinator, ConnectionManager, MessageBroadcaster};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub authenticator: Arc<dyn Authenticator>,
    pub sessions: Arc<SessionRegistry>,
    pub room_service: Arc<RoomService>,
    pub message_repository: Arc<dyn MessageRepository + Send + Sync>,
    pub invitations: Arc<InvitationRelay>,
    pub coordinator: Arc<ConnectionCoordinator>,
}

impl AppState {
    /// Wires every service from its collaborators. Each service receives its
    /// dependencies here; nothing reaches for a global.
    pub fn new(
        config: ServerConfig,
        room_repository: Arc<dyn RoomRepository + Send + Sync>,
        message_repository: Arc<dyn MessageRepository + Send + Sync>,
        authenticator: Arc<dyn Authenticator>,
        connection_manager: Arc<dyn ConnectionManager>,
    ) -> Self {
        let config = Arc::new(config);
        let sessions = Arc::new(SessionRegistry::new());
        let subscribers = Arc::new(SubscriberRegistry::new());
        let directory: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new());
        let broadcaster = MessageBroadcaster::new(Arc::clone(&connection_manager));

        let room_service = Arc::new(RoomService::new(
            room_repository,
            Arc::clone(&subscribers),
            Arc::clone(&directory),
            broadcaster.clone(),
        ));

        let pipeline = Arc::new(MessagePipeline::new(
            Arc::clone(&message_repository),
            Arc::clone(&room_service),
            broadcaster.clone(),
            config.max_message_length,
        ));

        let receipts = Arc::new(ReadReceiptTracker::new(
            Arc::clone(&message_repository),
            Arc::clone(&room_service),
            broadcaster.clone(),
        ));

        let typing = Arc::new(TypingBroadcaster::new(
            Arc::clone(&room_service),
            broadcaster.clone(),
        ));

        let invitations = Arc::new(InvitationRelay::new(
            Arc::clone(&room_service),
            Arc::clone(&sessions),
            broadcaster.clone(),
        ));

        let coordinator = Arc::new(ConnectionCoordinator::new(
            Arc::clone(&sessions),
            connection_manager,
            broadcaster,
            directory,
            Arc::clone(&room_service),
            pipeline,
            receipts,
            typing,
            Arc::clone(&invitations),
            config.cleanup_retry_attempts,
        ));

        Self {
            config,
            authenticator,
            sessions,
            room_service,
            message_repository,
            invitations,
            coordinator,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Not in room: {0}")]
    NotInRoom(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    /// Stable machine-readable code sent to clients in ERROR frames
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::NotInRoom(_) => "NOT_IN_ROOM",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::PersistenceFailed(_) => "PERSISTENCE_FAILED",
            AppError::ValidationFailed(_) => "VALIDATION_FAILED",
            AppError::Internal => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotInRoom(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::PersistenceFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Persistence failed: {}", msg),
            ),
            AppError::ValidationFailed(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHENTICATED")]
    #[case(AppError::NotInRoom("x".into()), StatusCode::FORBIDDEN, "NOT_IN_ROOM")]
    #[case(AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND")]
    #[case(AppError::PersistenceFailed("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_FAILED")]
    #[case(AppError::ValidationFailed("x".into()), StatusCode::BAD_REQUEST, "VALIDATION_FAILED")]
    #[case(AppError::Internal, StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")]
    fn test_error_status_and_code(
        #[case] error: AppError,
        #[case] status: StatusCode,
        #[case] code: &str,
    ) {
        assert_eq!(error.code(), code);
        assert_eq!(error.into_response().status(), status);
    }
}
