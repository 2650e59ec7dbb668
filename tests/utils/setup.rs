#![allow(dead_code)] // Test utilities may not all be used in every test

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use presence_relay::{
    broadcast::BroadcastPolicy,
    client::Participant,
    config::RelayConfig,
    websockets::{ConnectionManager, WebsocketReceiveHandler},
    AppState, RelayHandler, UserId,
};

use super::mocks::{MockConnectionManager, MockConnector, MockScene};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub type TestParticipant = Participant<MockScene, MockConnector>;

pub struct TestSetup {
    pub relay: Arc<RelayHandler>,
    pub mock_conn_manager: Arc<MockConnectionManager>,
    pub input_handler: WebsocketReceiveHandler,
    /// Client-side participants, keyed by name; their id is the same string
    pub participants: BTreeMap<String, TestParticipant>,
}

pub struct TestSetupBuilder {
    participants: Vec<(String, String)>,
    policy: BroadcastPolicy,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            participants: vec![],
            policy: BroadcastPolicy::OnChange,
        }
    }

    /// Adds a simulated client that will ask for `room` when it connects
    pub fn with_participant(mut self, name: &str, room: &str) -> Self {
        self.participants.push((name.to_string(), room.to_string()));
        self
    }

    pub fn with_policy(mut self, policy: BroadcastPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn build(self) -> TestSetup {
        let config = RelayConfig {
            broadcast: self.policy,
            ..RelayConfig::default()
        };
        let state = AppState::in_memory(config);
        let mock_conn_manager = Arc::new(MockConnectionManager::new());
        let conn_manager: Arc<dyn ConnectionManager> = mock_conn_manager.clone();

        let input_handler = WebsocketReceiveHandler::new(state.relay.clone(), conn_manager);

        let participants = self
            .participants
            .into_iter()
            .map(|(name, room)| {
                let participant =
                    Participant::new(MockScene::default(), MockConnector::default(), room);
                (name, participant)
            })
            .collect();

        TestSetup {
            relay: state.relay,
            mock_conn_manager,
            input_handler,
            participants,
        }
    }
}

impl TestSetup {
    pub fn id(name: &str) -> UserId {
        UserId::from(name)
    }

    pub fn participant(&self, name: &str) -> &TestParticipant {
        self.participants
            .get(name)
            .unwrap_or_else(|| panic!("no participant named {}", name))
    }

    pub fn participant_mut(&mut self, name: &str) -> &mut TestParticipant {
        self.participants
            .get_mut(name)
            .unwrap_or_else(|| panic!("no participant named {}", name))
    }

    /// Opens a relay connection for `name` without driving a client
    pub async fn open_connection(&self, name: &str) {
        let (sender, _receiver) = mpsc::unbounded_channel();
        self.input_handler
            .on_connect(&Self::id(name), sender)
            .await;
    }
}
