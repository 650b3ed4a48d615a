//! Public entry point used by front ends.

use std::sync::Arc;

use socrates_protocol::{kinds, MessagePayload};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::messaging::{ClientEvent, ConnectionState, EventRegistry, Listener};
use crate::websocket::{ConnectionManager, Connector, TungsteniteConnector};

use super::prompt::build_hint_prompt;

/// Tutor link: connection lifecycle, typed events, and the chat helpers.
///
/// Cheap to clone; clones share the same connection and subscriptions.
#[derive(Clone)]
pub struct TutorClient {
    connection: ConnectionManager,
}

impl TutorClient {
    /// Client backed by a real WebSocket connection.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, Arc::new(TungsteniteConnector))
    }

    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            connection: ConnectionManager::new(config, connector, EventRegistry::new()),
        }
    }

    pub async fn connect(&self) -> Result<(), ClientError> {
        self.connection.connect().await
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn send(&self, kind: &str, payload: impl Into<MessagePayload>) -> bool {
        self.connection.send(kind, payload)
    }

    /// Ask for a hint on `question` given the student's current step.
    pub fn send_chat_message(&self, user_input: &str, question: &str) -> bool {
        let prompt = build_hint_prompt(question, user_input);
        self.send(kinds::CHAT, prompt)
    }

    /// Clear the conversation on the server.
    pub fn reset_session(&self) -> bool {
        self.send(kinds::RESET, MessagePayload::Empty)
    }

    /// Ask the server for the conversation so far; it arrives as a `history`
    /// event.
    pub fn get_history(&self) -> bool {
        self.send(kinds::HISTORY, MessagePayload::Empty)
    }

    pub fn on(&self, event: ClientEvent, callback: Listener) {
        self.connection.registry().on(event, callback);
    }

    pub fn off(&self, event: ClientEvent, callback: &Listener) -> bool {
        self.connection.registry().off(event, callback)
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.connection.reconnect_attempts()
    }

    pub fn config(&self) -> &ClientConfig {
        self.connection.config()
    }

    pub fn registry(&self) -> &EventRegistry {
        self.connection.registry()
    }
}
