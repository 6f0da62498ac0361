#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use roomchat::{
    config::ServerConfig,
    message::repository::{InMemoryMessageRepository, MessageRepository},
    room::{
        models::RoomModel,
        repository::{InMemoryRoomRepository, RoomRepository},
    },
    session::{JwtAuthenticator, TokenConfig},
    AppState, Identity,
};

use super::mocks::MockConnectionManager;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub const TEST_SECRET: &str = "integration-secret";

pub struct TestSetup {
    pub state: AppState,
    pub mock_conn_manager: Arc<MockConnectionManager>,
    pub message_repository: Arc<dyn MessageRepository + Send + Sync>,
    pub room_id: String,
    /// user_id -> connection ids, in connect order
    pub connections: HashMap<String, Vec<String>>,
}

pub struct TestSetupBuilder {
    users: Vec<String>,
    room_repository: Option<Arc<dyn RoomRepository + Send + Sync>>,
    message_repository: Option<Arc<dyn MessageRepository + Send + Sync>>,
    cleanup_retry_attempts: u32,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            users: vec![],
            room_repository: None,
            message_repository: None,
            cleanup_retry_attempts: 3,
        }
    }

    /// Users that connect (one connection each) before the test starts
    pub fn with_users(mut self, users: Vec<&str>) -> Self {
        self.users = users.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_alice_and_bob(self) -> Self {
        self.with_users(vec!["alice", "bob"])
    }

    pub fn with_room_repository(mut self, repo: Arc<dyn RoomRepository + Send + Sync>) -> Self {
        self.room_repository = Some(repo);
        self
    }

    pub fn with_message_repository(
        mut self,
        repo: Arc<dyn MessageRepository + Send + Sync>,
    ) -> Self {
        self.message_repository = Some(repo);
        self
    }

    pub fn with_cleanup_retry_attempts(mut self, attempts: u32) -> Self {
        self.cleanup_retry_attempts = attempts;
        self
    }

    pub async fn build(self) -> TestSetup {
        let room_repository = self
            .room_repository
            .unwrap_or_else(|| Arc::new(InMemoryRoomRepository::new()));
        let message_repository = self
            .message_repository
            .unwrap_or_else(|| Arc::new(InMemoryMessageRepository::new()));
        let mock_conn_manager = Arc::new(MockConnectionManager::new());

        let config = ServerConfig {
            jwt_secret: TEST_SECRET.to_string(),
            cleanup_retry_attempts: self.cleanup_retry_attempts,
            max_message_length: 200,
            ..ServerConfig::default()
        };
        let token_config = TokenConfig::new(TEST_SECRET.to_string(), 1);

        let state = AppState::new(
            config,
            Arc::clone(&room_repository),
            Arc::clone(&message_repository),
            Arc::new(JwtAuthenticator::new(token_config)),
            mock_conn_manager.clone(),
        );

        // Room starts with zero participants
        let mut room = RoomModel::new("general".to_string(), None, "owner".to_string());
        room.participants.clear();
        room_repository.create_room(&room).await.unwrap();

        let mut setup = TestSetup {
            state,
            mock_conn_manager,
            message_repository,
            room_id: room.id,
            connections: HashMap::new(),
        };

        for user in &self.users {
            setup.connect(user).await;
        }
        setup.clear_messages().await;

        setup
    }
}

impl TestSetup {
    /// Opens another authenticated connection for `user_id`
    pub async fn connect(&mut self, user_id: &str) -> String {
        let (sender, _receiver) = mpsc::unbounded_channel();
        let identity = Identity {
            user_id: user_id.to_string(),
            username: display_name(user_id),
        };

        let connection_id = self.state.coordinator.connect(identity, sender).await;
        self.connections
            .entry(user_id.to_string())
            .or_default()
            .push(connection_id.clone());
        connection_id
    }

    /// The user's first connection
    pub fn conn(&self, user_id: &str) -> &str {
        self.connections
            .get(user_id)
            .and_then(|ids| ids.first())
            .map(String::as_str)
            .unwrap_or_else(|| panic!("{} is not connected", user_id))
    }

    pub async fn room(&self) -> RoomModel {
        self.state
            .room_service
            .require_room(&self.room_id)
            .await
            .unwrap()
    }

    pub async fn participants(&self) -> Vec<String> {
        self.room().await.participant_ids()
    }
}

pub fn display_name(user_id: &str) -> String {
    let mut chars = user_id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
