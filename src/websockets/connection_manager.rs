use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use super::messages::WebSocketMessage;
use crate::user::UserId;

#[async_trait]
pub trait ConnectionManager: Send + Sync {
    async fn add_connection(&self, user_id: UserId, sender: mpsc::UnboundedSender<String>);

    async fn remove_connection(&self, user_id: &UserId);

    async fn send_to_user(&self, user_id: &UserId, message: &str);

    /// Sends to every open connection
    async fn broadcast_all(&self, message: &str);

    /// Serializes and sends a protocol message; encoding failures are logged and dropped
    async fn send_message(&self, user_id: &UserId, message: &WebSocketMessage) {
        match message.to_json() {
            Ok(json) => self.send_to_user(user_id, &json).await,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to serialize outbound message");
            }
        }
    }
}

pub struct InMemoryConnectionManager {
    // user id -> sender
    connections: Arc<RwLock<HashMap<UserId, mpsc::UnboundedSender<String>>>>,
}

impl Default for InMemoryConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ConnectionManager for InMemoryConnectionManager {
    async fn add_connection(&self, user_id: UserId, sender: mpsc::UnboundedSender<String>) {
        let mut connections = self.connections.write().await;
        connections.insert(user_id, sender);
    }

    async fn remove_connection(&self, user_id: &UserId) {
        let mut connections = self.connections.write().await;
        connections.remove(user_id);
    }

    async fn send_to_user(&self, user_id: &UserId, message: &str) {
        let connections = self.connections.read().await;
        if let Some(sender) = connections.get(user_id) {
            // Fire-and-forget: a closed channel means the socket is already going away
            let _ = sender.send(message.to_string());
        }
    }

    async fn broadcast_all(&self, message: &str) {
        let connections = self.connections.read().await;
        for sender in connections.values() {
            let _ = sender.send(message.to_string());
        }
    }
}
