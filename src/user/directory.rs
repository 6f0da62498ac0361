use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Remembers display names for user ids seen by the server
///
/// Names come from authenticated identities; the directory lets the core
/// label participants and message senders without calling back into the
/// auth collaborator.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Record (or refresh) the display name for a user
    async fn remember(&self, user_id: &str, username: &str);

    /// Get display name by user id
    async fn display_name(&self, user_id: &str) -> Option<String>;

    /// Resolve several ids at once; unknown ids are left out of the map
    async fn display_names(&self, user_ids: &[String]) -> HashMap<String, String> {
        let mut names = HashMap::new();
        for user_id in user_ids {
            if let Some(name) = self.display_name(user_id).await {
                names.insert(user_id.clone(), name);
            }
        }
        names
    }
}

/// In-memory implementation of UserDirectory
/// Uses RwLock for concurrent access with read optimization
pub struct InMemoryUserDirectory {
    names: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            names: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn remember(&self, user_id: &str, username: &str) {
        let mut names = self.names.write().await;
        let previous = names.insert(user_id.to_string(), username.to_string());

        if previous.as_deref() != Some(username) {
            info!(
                user_id = %user_id,
                username = %username,
                "Recorded display name"
            );
        }
    }

    async fn display_name(&self, user_id: &str) -> Option<String> {
        let result = self.names.read().await.get(user_id).cloned();

        debug!(
            user_id = %user_id,
            username = ?result,
            "User id to display name lookup"
        );

        result
    }

    async fn display_names(&self, user_ids: &[String]) -> HashMap<String, String> {
        let names = self.names.read().await;
        user_ids
            .iter()
            .filter_map(|id| names.get(id).map(|name| (id.clone(), name.clone())))
            .collect()
    }
}
