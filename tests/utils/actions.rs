#![allow(dead_code)]

use serde_json::json;

use roomchat::websockets::{MessageHandler, MessageType, WebSocketMessage};

use super::setup::TestSetup;

// ============================================================================
// Action Helpers
// ============================================================================

impl TestSetup {
    /// Deliver a client frame on a specific connection and wait for it to be handled
    pub async fn send_on(&self, connection_id: &str, message: WebSocketMessage) {
        let message_json = serde_json::to_string(&message).unwrap();
        self.state
            .coordinator
            .handle_message(connection_id, message_json)
            .await;
    }

    /// Deliver a client frame on the user's first connection
    pub async fn send_as(&self, user_id: &str, message: WebSocketMessage) {
        let connection_id = self.conn(user_id).to_string();
        self.send_on(&connection_id, message).await;
    }

    pub async fn clear_messages(&self) {
        self.mock_conn_manager.clear_messages().await;
    }

    // ============================================================================
    // Convenience Action Methods
    // ============================================================================

    pub async fn join(&self, user_id: &str) {
        self.send_as(user_id, join_frame(&self.room_id)).await;
    }

    pub async fn leave(&self, user_id: &str) {
        self.send_as(
            user_id,
            WebSocketMessage::new(MessageType::LeaveRoom, json!({ "room_id": self.room_id })),
        )
        .await;
    }

    pub async fn send_text(&self, user_id: &str, text: &str) {
        self.send_as(user_id, send_frame(&self.room_id, text)).await;
    }

    pub async fn typing(&self, user_id: &str, is_typing: bool) {
        self.send_as(
            user_id,
            WebSocketMessage::new(
                MessageType::TypingStatus,
                json!({ "room_id": self.room_id, "is_typing": is_typing }),
            ),
        )
        .await;
    }

    pub async fn mark_read(&self, user_id: &str, message_id: &str) {
        self.send_as(user_id, mark_read_frame(&self.room_id, message_id))
            .await;
    }

    pub async fn invite(&self, user_id: &str, targets: Vec<&str>) {
        self.send_as(user_id, invite_frame(&self.room_id, targets))
            .await;
    }

    /// Simulate the transport closing the user's first connection
    pub async fn disconnect(&self, user_id: &str) {
        self.state.coordinator.disconnect(self.conn(user_id)).await;
    }
}

pub fn join_frame(room_id: &str) -> WebSocketMessage {
    WebSocketMessage::new(MessageType::JoinRoom, json!({ "room_id": room_id }))
}

pub fn send_frame(room_id: &str, text: &str) -> WebSocketMessage {
    WebSocketMessage::new(
        MessageType::SendMessage,
        json!({ "room_id": room_id, "text": text }),
    )
}

pub fn mark_read_frame(room_id: &str, message_id: &str) -> WebSocketMessage {
    WebSocketMessage::new(
        MessageType::MarkAsRead,
        json!({ "room_id": room_id, "message_id": message_id }),
    )
}

pub fn invite_frame(room_id: &str, targets: Vec<&str>) -> WebSocketMessage {
    WebSocketMessage::new(
        MessageType::Invite,
        json!({ "room_id": room_id, "user_ids": targets }),
    )
}
