use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::types::Identity;
use crate::shared::AppError;

/// A live binding between one transport connection and an authenticated user
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub connection_id: String,
    pub identity: Identity,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    pub fn username(&self) -> &str {
        &self.identity.username
    }
}

/// Maps active connections to authenticated identities.
/// Process-lifetime only; nothing here is persisted.
pub struct SessionRegistry {
    // connection_id -> session
    sessions: RwLock<HashMap<String, Session>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Binds a connection to a user and returns the new session id.
    /// Re-registering a connection replaces its previous binding.
    pub async fn register(&self, connection_id: &str, identity: Identity) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            session_id: session_id.clone(),
            connection_id: connection_id.to_string(),
            identity,
            connected_at: Utc::now(),
        };

        info!(
            connection_id = %connection_id,
            session_id = %session_id,
            user_id = %session.identity.user_id,
            "Session registered"
        );

        self.sessions
            .write()
            .await
            .insert(connection_id.to_string(), session);

        session_id
    }

    /// Resolves the session behind a connection, or `Unauthenticated` if there is none
    pub async fn resolve(&self, connection_id: &str) -> Result<Session, AppError> {
        self.sessions
            .read()
            .await
            .get(connection_id)
            .cloned()
            .ok_or_else(|| {
                debug!(connection_id = %connection_id, "No session for connection");
                AppError::Unauthenticated(format!(
                    "Connection {} is not authenticated",
                    connection_id
                ))
            })
    }

    /// Removes the binding. Returns the session only to the first caller,
    /// which is what makes disconnect cleanup run exactly once.
    pub async fn unregister(&self, connection_id: &str) -> Option<Session> {
        let removed = self.sessions.write().await.remove(connection_id);
        if let Some(session) = &removed {
            info!(
                connection_id = %connection_id,
                session_id = %session.session_id,
                user_id = %session.identity.user_id,
                "Session unregistered"
            );
        }
        removed
    }

    /// All live connections currently authenticated as `user_id`
    pub async fn connections_for_user(&self, user_id: &str) -> Vec<String> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|session| session.identity.user_id == user_id)
            .map(|session| session.connection_id.clone())
            .collect()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
