#![allow(dead_code)] // Test utilities may not all be used in every test

use presence_relay::{
    signaling::IceCandidate,
    websockets::{MessageHandler, WebSocketMessage},
    Pose, UserId,
};

use super::setup::TestSetup;

// ============================================================================
// Action Helpers
// ============================================================================

// Upper bound on relay/client exchange rounds before a test is considered stuck
const MAX_PUMP_ROUNDS: usize = 64;

impl TestSetup {
    /// Send a WebSocket message to the relay on behalf of `name`
    pub async fn send_message(&self, name: &str, message: WebSocketMessage) {
        let message_json = message.to_json().unwrap();
        self.input_handler
            .handle_message(&Self::id(name), message_json)
            .await;
    }

    async fn send_all(&self, name: &str, messages: Vec<WebSocketMessage>) {
        for message in messages {
            self.send_message(name, message).await;
        }
    }

    /// Feeds relay output to the simulated clients and their replies back to
    /// the relay until nothing is left in flight
    pub async fn pump(&mut self) {
        let TestSetup {
            participants,
            input_handler,
            mock_conn_manager,
            ..
        } = self;

        for _ in 0..MAX_PUMP_ROUNDS {
            let mut delivered = false;

            for (name, participant) in participants.iter_mut() {
                let user_id = UserId::from(name.as_str());
                for raw in mock_conn_manager.drain_messages_for(&user_id).await {
                    delivered = true;
                    let message: WebSocketMessage = serde_json::from_str(&raw).unwrap();
                    for reply in participant.handle(message).await {
                        input_handler
                            .handle_message(&user_id, reply.to_json().unwrap())
                            .await;
                    }
                }
            }

            if !delivered {
                return;
            }
        }
        panic!("relay and clients kept exchanging messages");
    }

    /// Connects `name`'s client and runs the join handshake to completion
    pub async fn join(&mut self, name: &str) {
        self.open_connection(name).await;
        let outbound = self.participant_mut(name).on_connected();
        self.send_all(name, outbound).await;
        self.pump().await;
    }

    /// Emits one pose tick from `name`, if its client is allowed to tick yet
    pub async fn move_to(&mut self, name: &str, pose: Pose) {
        if let Some(tick) = self.participant(name).pose_tick(pose) {
            self.send_message(name, tick).await;
        }
        self.pump().await;
    }

    pub async fn change_room(&mut self, name: &str, room: &str) {
        let outbound = self.participant_mut(name).change_room(room).await;
        self.send_all(name, outbound).await;
        self.pump().await;
    }

    /// Drops `name`'s transport: the relay cleans up and the client tears down locally
    pub async fn disconnect(&mut self, name: &str) {
        self.input_handler.on_disconnect(&Self::id(name)).await;
        self.participant_mut(name).on_transport_closed().await;
        self.pump().await;
    }

    /// `name` gathered a local ICE candidate for `peer`
    pub async fn gather_candidate(&mut self, name: &str, peer: &str, candidate: &str) {
        let message = self
            .participant_mut(name)
            .on_local_candidate(&Self::id(peer), IceCandidate::new(candidate));
        if let Some(message) = message {
            self.send_message(name, message).await;
        }
        self.pump().await;
    }

    /// `name`'s peer connection to `peer` reported connected
    pub fn peer_connected(&mut self, name: &str, peer: &str) -> bool {
        self.participant_mut(name).on_peer_connected(&Self::id(peer))
    }

    /// Clear all recorded messages
    pub async fn clear_messages(&self) {
        self.mock_conn_manager.clear_messages().await;
    }
}
