use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// A live connection currently receiving broadcasts for a room
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscriber {
    pub connection_id: String,
    pub user_id: String,
}

#[derive(Default)]
struct SubscriptionTables {
    // room_id -> (connection_id -> user_id)
    rooms: HashMap<String, HashMap<String, String>>,
    // connection_id -> room_ids, for disconnect cleanup
    connections: HashMap<String, HashSet<String>>,
}

/// Live, connection-derived subscriber sets per room.
///
/// Distinct from the persisted participant set: entries exist only while the
/// connection is open and are removed wholesale at disconnect.
#[derive(Default)]
pub struct SubscriberRegistry {
    tables: RwLock<SubscriptionTables>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the connection was not already subscribed
    pub async fn subscribe(&self, room_id: &str, connection_id: &str, user_id: &str) -> bool {
        let mut tables = self.tables.write().await;

        let newly = tables
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id.to_string(), user_id.to_string())
            .is_none();
        tables
            .connections
            .entry(connection_id.to_string())
            .or_default()
            .insert(room_id.to_string());

        debug!(
            room_id = %room_id,
            connection_id = %connection_id,
            newly_subscribed = newly,
            "Subscriber registered"
        );
        newly
    }

    /// Returns true if the connection was subscribed
    pub async fn unsubscribe(&self, room_id: &str, connection_id: &str) -> bool {
        let mut tables = self.tables.write().await;

        let removed = match tables.rooms.get_mut(room_id) {
            Some(members) => {
                let removed = members.remove(connection_id).is_some();
                if members.is_empty() {
                    tables.rooms.remove(room_id);
                }
                removed
            }
            None => false,
        };

        if let Some(rooms) = tables.connections.get_mut(connection_id) {
            rooms.remove(room_id);
            if rooms.is_empty() {
                tables.connections.remove(connection_id);
            }
        }

        removed
    }

    /// Drops every subscription held by the connection and returns the rooms it was in
    pub async fn remove_connection(&self, connection_id: &str) -> Vec<String> {
        let mut tables = self.tables.write().await;

        let rooms: Vec<String> = tables
            .connections
            .remove(connection_id)
            .map(|rooms| rooms.into_iter().collect())
            .unwrap_or_default();

        for room_id in &rooms {
            if let Some(members) = tables.rooms.get_mut(room_id) {
                members.remove(connection_id);
                if members.is_empty() {
                    tables.rooms.remove(room_id);
                }
            }
        }

        debug!(
            connection_id = %connection_id,
            room_count = rooms.len(),
            "Removed all subscriptions for connection"
        );
        rooms
    }

    pub async fn subscribers(&self, room_id: &str) -> Vec<Subscriber> {
        self.tables
            .read()
            .await
            .rooms
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .map(|(connection_id, user_id)| Subscriber {
                        connection_id: connection_id.clone(),
                        user_id: user_id.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn is_subscribed(&self, room_id: &str, connection_id: &str) -> bool {
        self.tables
            .read()
            .await
            .rooms
            .get(room_id)
            .is_some_and(|members| members.contains_key(connection_id))
    }

    /// True while any connection of `user_id` is subscribed to the room
    pub async fn has_user(&self, room_id: &str, user_id: &str) -> bool {
        self.tables
            .read()
            .await
            .rooms
            .get(room_id)
            .is_some_and(|members| members.values().any(|member| member == user_id))
    }

    pub async fn rooms_for(&self, connection_id: &str) -> Vec<String> {
        self.tables
            .read()
            .await
            .connections
            .get(connection_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let registry = SubscriberRegistry::new();

        assert!(registry.subscribe("room-1", "conn-a", "alice").await);
        assert!(!registry.subscribe("room-1", "conn-a", "alice").await);

        let subscribers = registry.subscribers("room-1").await;
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].user_id, "alice");
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_only_that_room() {
        let registry = SubscriberRegistry::new();
        registry.subscribe("room-1", "conn-a", "alice").await;
        registry.subscribe("room-2", "conn-a", "alice").await;

        assert!(registry.unsubscribe("room-1", "conn-a").await);
        assert!(!registry.unsubscribe("room-1", "conn-a").await);

        assert!(!registry.is_subscribed("room-1", "conn-a").await);
        assert!(registry.is_subscribed("room-2", "conn-a").await);
        assert_eq!(registry.rooms_for("conn-a").await, vec!["room-2".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_connection_clears_every_room() {
        let registry = SubscriberRegistry::new();
        registry.subscribe("room-1", "conn-a", "alice").await;
        registry.subscribe("room-2", "conn-a", "alice").await;
        registry.subscribe("room-1", "conn-b", "bob").await;

        let mut rooms = registry.remove_connection("conn-a").await;
        rooms.sort();
        assert_eq!(rooms, vec!["room-1".to_string(), "room-2".to_string()]);

        let remaining = registry.subscribers("room-1").await;
        assert_eq!(
            remaining,
            vec![Subscriber {
                connection_id: "conn-b".to_string(),
                user_id: "bob".to_string()
            }]
        );
        assert!(registry.subscribers("room-2").await.is_empty());
        assert!(registry.remove_connection("conn-a").await.is_empty());
    }

    #[tokio::test]
    async fn test_has_user_tracks_any_connection_of_user() {
        let registry = SubscriberRegistry::new();
        registry.subscribe("room-1", "tab-1", "alice").await;
        registry.subscribe("room-1", "tab-2", "alice").await;

        registry.remove_connection("tab-1").await;
        assert!(registry.has_user("room-1", "alice").await);

        registry.unsubscribe("room-1", "tab-2").await;
        assert!(!registry.has_user("room-1", "alice").await);
        assert!(!registry.has_user("room-2", "alice").await);
    }
}
