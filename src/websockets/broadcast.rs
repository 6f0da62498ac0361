use std::sync::Arc;
use tracing::{debug, warn};

use super::connection_manager::ConnectionManager;
use super::messages::WebSocketMessage;

/// Broadcast capability handed to every service at construction
#[derive(Clone)]
pub struct MessageBroadcaster {
    connections: Arc<dyn ConnectionManager>,
}

impl MessageBroadcaster {
    pub fn new(connections: Arc<dyn ConnectionManager>) -> Self {
        Self { connections }
    }

    pub async fn send_to_connection(&self, connection_id: &str, message: &WebSocketMessage) {
        let Ok(json) = message.to_json() else {
            warn!(
                message_type = ?message.message_type,
                connection_id = %connection_id,
                "Dropped unserializable frame"
            );
            return;
        };
        self.connections.send_to_connection(connection_id, &json).await;
    }

    pub async fn broadcast(&self, connection_ids: &[String], message: &WebSocketMessage) {
        if connection_ids.is_empty() {
            return;
        }
        let Ok(json) = message.to_json() else {
            warn!(
                message_type = ?message.message_type,
                recipients = connection_ids.len(),
                "Dropped unserializable broadcast"
            );
            return;
        };

        debug!(
            message_type = ?message.message_type,
            recipients = connection_ids.len(),
            "Broadcasting message"
        );
        self.connections.send_to_connections(connection_ids, &json).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websockets::{InMemoryConnectionManager, MessageType};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_broadcast_reaches_open_connections_only() {
        let connections = Arc::new(InMemoryConnectionManager::new());
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        connections.add_connection("a".to_string(), tx_a).await;
        connections.add_connection("b".to_string(), tx_b).await;
        drop(rx_b);
        let broadcaster = MessageBroadcaster::new(connections);

        let message = WebSocketMessage::ready("alice", "Alice", "s-1");
        broadcaster
            .broadcast(
                &["a".to_string(), "b".to_string(), "gone".to_string()],
                &message,
            )
            .await;

        let frame: WebSocketMessage = serde_json::from_str(&rx_a.try_recv().unwrap()).unwrap();
        assert_eq!(frame.message_type, MessageType::Ready);
        assert!(rx_a.try_recv().is_err());
    }
}
