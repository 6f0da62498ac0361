//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;

use roomchat::websockets::{MessageType, WebSocketMessage};

use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct MessageAssertion<'a> {
    setup: &'a TestSetup,
    connections: Vec<String>,
}

impl<'a> MessageAssertion<'a> {
    /// Assert on the first connection of each named user
    pub fn for_users(setup: &'a TestSetup, users: Vec<&str>) -> Self {
        let connections = users
            .into_iter()
            .map(|user| setup.conn(user).to_string())
            .collect();
        Self { setup, connections }
    }

    pub fn for_user(setup: &'a TestSetup, user: &str) -> Self {
        Self::for_users(setup, vec![user])
    }

    pub fn for_connections(setup: &'a TestSetup, connections: Vec<String>) -> Self {
        Self { setup, connections }
    }

    /// Assert that every connection received a message of this type next
    /// (consumes it) and that all of them carry the same payload
    pub async fn received_message_type(self, expected_type: MessageType) -> MessageContent {
        let mut messages = vec![];

        for connection_id in &self.connections {
            let message = self
                .setup
                .mock_conn_manager
                .consume_message_for(connection_id)
                .await
                .unwrap_or_else(|| {
                    panic!(
                        "{} should have received {:?}",
                        connection_id, expected_type
                    )
                });

            let msg: WebSocketMessage = serde_json::from_str(&message).unwrap();
            assert_eq!(
                msg.message_type, expected_type,
                "{} received wrong message type",
                connection_id
            );
            messages.push(msg);
        }

        let first_payload = &messages[0].payload;
        for (i, msg) in messages.iter().enumerate().skip(1) {
            assert_eq!(
                &msg.payload, first_payload,
                "Connection {} payload differs from connection {}",
                self.connections[i], self.connections[0]
            );
        }

        MessageContent {
            payload: messages[0].payload.clone(),
        }
    }

    /// Assert that the connections have nothing queued
    pub async fn received_no_messages(self) {
        for connection_id in &self.connections {
            let messages = self
                .setup
                .mock_conn_manager
                .get_messages_for(connection_id)
                .await;
            assert!(
                messages.is_empty(),
                "{} should not have received any messages, got {:?}",
                connection_id,
                messages
            );
        }
    }

    /// Count queued messages of a type for each connection (non-consuming)
    pub async fn count_message_type(&self, msg_type: MessageType) -> Vec<usize> {
        let mut counts = vec![];
        for connection_id in &self.connections {
            let messages = self
                .setup
                .mock_conn_manager
                .get_messages_for(connection_id)
                .await;
            counts.push(
                messages
                    .iter()
                    .filter_map(|raw| serde_json::from_str::<WebSocketMessage>(raw).ok())
                    .filter(|msg| msg.message_type == msg_type)
                    .count(),
            );
        }
        counts
    }

    /// Payloads of every queued message of a type, in delivery order, for the first connection
    pub async fn payloads_of(&self, msg_type: MessageType) -> Vec<Value> {
        self.setup
            .mock_conn_manager
            .get_messages_for(&self.connections[0])
            .await
            .iter()
            .filter_map(|raw| serde_json::from_str::<WebSocketMessage>(raw).ok())
            .filter(|msg| msg.message_type == msg_type)
            .map(|msg| msg.payload)
            .collect()
    }
}

pub struct MessageContent {
    pub payload: Value,
}

impl MessageContent {
    pub fn str_field(&self, name: &str) -> &str {
        self.payload[name]
            .as_str()
            .unwrap_or_else(|| panic!("payload has no string field {}: {}", name, self.payload))
    }

    /// User ids from a ROOM_USERS_UPDATED payload
    pub fn participant_ids(&self) -> Vec<String> {
        self.payload["participants"]
            .as_array()
            .expect("participants should be an array")
            .iter()
            .map(|p| p["user_id"].as_str().unwrap().to_string())
            .collect()
    }

    pub fn verify_participants(self, expected: &[&str]) -> Self {
        assert_eq!(self.participant_ids(), expected);
        self
    }

    pub fn verify_error_code(self, code: &str) -> Self {
        assert_eq!(self.str_field("code"), code, "unexpected error: {}", self.payload);
        self
    }

    pub fn verify_text(self, text: &str) -> Self {
        assert_eq!(self.str_field("text"), text);
        self
    }
}
