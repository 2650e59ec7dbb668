use async_trait::async_trait;
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::relay::{Envelope, RelayHandler};
use crate::shared::AppState;
use crate::user::UserId;
use crate::websockets::messages::{MessageType, WebSocketMessage};

use super::connection_manager::ConnectionManager;
use super::socket::{Connection, MessageHandler};

/// Pushes relay output to the addressed connections
pub async fn deliver(connection_manager: &dyn ConnectionManager, envelopes: Vec<Envelope>) {
    for envelope in envelopes {
        connection_manager
            .send_message(&envelope.recipient, &envelope.message)
            .await;
    }
}

/// Tells every open connection the relay is going away
pub async fn broadcast_disconnect(connection_manager: &dyn ConnectionManager) {
    match WebSocketMessage::bare(MessageType::Disconnect).to_json() {
        Ok(json) => connection_manager.broadcast_all(&json).await,
        Err(e) => warn!(error = %e, "Failed to encode disconnect message"),
    }
}

/// Message handler for receiving WebSocket messages from the client
pub struct WebsocketReceiveHandler {
    relay: Arc<RelayHandler>,
    connection_manager: Arc<dyn ConnectionManager>,
}

impl WebsocketReceiveHandler {
    pub fn new(relay: Arc<RelayHandler>, connection_manager: Arc<dyn ConnectionManager>) -> Self {
        Self {
            relay,
            connection_manager,
        }
    }

    /// Registers the outbound channel and arms the participant's readiness gate
    pub async fn on_connect(&self, user_id: &UserId, sender: mpsc::UnboundedSender<String>) {
        self.connection_manager
            .add_connection(user_id.clone(), sender)
            .await;
        self.relay.connect_as(user_id).await;
    }

    /// Runs the terminal cleanup and notifies whoever is affected
    pub async fn on_disconnect(&self, user_id: &UserId) {
        self.connection_manager.remove_connection(user_id).await;
        let envelopes = self.relay.disconnect(user_id).await;
        deliver(self.connection_manager.as_ref(), envelopes).await;
    }
}

#[async_trait]
impl MessageHandler for WebsocketReceiveHandler {
    async fn handle_message(&self, user_id: &UserId, message: String) {
        debug!(user_id = %user_id, message = %message, "Received message");

        let envelopes = self.relay.handle_text(user_id, &message).await;
        deliver(self.connection_manager.as_ref(), envelopes).await;
    }
}

/// WebSocket endpoint; every upgrade becomes a fresh anonymous participant
///
/// GET /ws
pub async fn websocket_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    info!("WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, app_state))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(socket: axum::extract::ws::WebSocket, app_state: AppState) {
    let user_id = UserId::generate();
    info!(user_id = %user_id, "WebSocket connection established");

    // Create the outbound channel (app -> client)
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();

    let message_handler = Arc::new(WebsocketReceiveHandler::new(
        app_state.relay.clone(),
        app_state.connection_manager.clone(),
    ));
    message_handler.on_connect(&user_id, outbound_sender).await;

    let connection = Connection::new(
        user_id.clone(),
        Box::new(socket),
        outbound_receiver,
        message_handler.clone(),
    );

    // Run the connection until disconnect
    match connection.run().await {
        Ok(()) => {
            info!(user_id = %user_id, "WebSocket connection closed cleanly");
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "WebSocket connection error");
        }
    }

    message_handler.on_disconnect(&user_id).await;
    info!(user_id = %user_id, "Participant cleanup complete");
}
