//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use presence_relay::websockets::{MessageType, WebSocketMessage};
use presence_relay::{PresenceSnapshot, UserId};

use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Checks frames the relay queued for users that have no simulated client
pub struct MessageAssertion<'a> {
    setup: &'a TestSetup,
    users: Vec<&'a str>,
}

impl<'a> MessageAssertion<'a> {
    pub fn for_users(setup: &'a TestSetup, users: Vec<&'a str>) -> Self {
        Self { setup, users }
    }

    pub fn for_user(setup: &'a TestSetup, user: &'a str) -> Self {
        Self::for_users(setup, vec![user])
    }

    /// Assert that users received a specific message type (consumes the message from queue)
    pub async fn received_message_type(self, expected_type: MessageType) -> MessageContent {
        let mut messages = vec![];

        for user in &self.users {
            let message = self.setup.mock_conn_manager.consume_message_for(user).await;
            let message = message.unwrap_or_else(|| panic!("{} should have received a message", user));

            let msg: WebSocketMessage = serde_json::from_str(&message).unwrap();
            assert_eq!(
                msg.message_type, expected_type,
                "{} received wrong message type",
                user
            );
            messages.push(msg);
        }

        MessageContent {
            payload: messages[0].payload.clone(),
        }
    }

    /// Assert that users received a sequence of message types in order (consuming)
    pub async fn received_message_sequence(self, expected_types: Vec<MessageType>) {
        for user in &self.users {
            for (i, expected_type) in expected_types.iter().enumerate() {
                let raw = self
                    .setup
                    .mock_conn_manager
                    .consume_message_for(user)
                    .await
                    .unwrap_or_else(|| panic!("{} is missing message {}", user, i));
                let msg: WebSocketMessage = serde_json::from_str(&raw)
                    .unwrap_or_else(|e| panic!("Failed to parse message {} for {}: {}", i, user, e));

                assert_eq!(
                    msg.message_type, *expected_type,
                    "{} message {} has wrong type: expected {:?}, got {:?}",
                    user, i, expected_type, msg.message_type
                );
            }
        }
    }

    /// Assert that users have nothing queued
    pub async fn received_no_messages(self) {
        for user in &self.users {
            let messages = self.setup.mock_conn_manager.get_messages_for(user).await;
            assert!(
                messages.is_empty(),
                "{} should not have received any messages, got {:?}",
                user,
                messages
            );
        }
    }

    /// Count how many messages of a specific type a user has queued (non-consuming)
    pub async fn count_message_type(&self, user: &str, msg_type: MessageType) -> usize {
        let messages = self.setup.mock_conn_manager.get_messages_for(user).await;
        messages
            .iter()
            .filter_map(|msg_str| serde_json::from_str::<WebSocketMessage>(msg_str).ok())
            .filter(|msg| msg.message_type == msg_type)
            .count()
    }
}

// ============================================================================
// Message Content Assertions
// ============================================================================

pub struct MessageContent {
    payload: serde_json::Value,
}

impl MessageContent {
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Assert the message names a specific peer
    pub fn with_peer(self, expected_peer: &str) -> Self {
        assert_eq!(self.payload["peer_id"], expected_peer);
        self
    }

    pub fn with_create_offer(self, expected: bool) -> Self {
        assert_eq!(self.payload["create_offer"], expected);
        self
    }

    pub fn with_room(self, expected_room: &str) -> Self {
        assert_eq!(self.payload["room"], expected_room);
        self
    }

    pub fn as_snapshot(&self) -> PresenceSnapshot {
        serde_json::from_value(self.payload.clone()).unwrap()
    }

    /// Assert a snapshot payload holds exactly these users
    pub fn with_users(self, expected: Vec<&str>) -> Self {
        let snapshot = self.as_snapshot();
        let actual: Vec<&UserId> = snapshot.user_ids().collect();
        let expected: Vec<UserId> = expected.into_iter().map(UserId::from).collect();
        assert_eq!(actual, expected.iter().collect::<Vec<_>>());
        self
    }
}
