//! Client-side chat state and the transitions that drive it.

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use super::api::ChatApi;
use crate::models::{Message, MessageRole};

/// Which round trip is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRequest {
    CreateSession,
    Message,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPhase {
    Idle,
    Sending(PendingRequest),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    pub session_id: Option<Uuid>,
    pub messages: Vec<Message>,
    pub phase: ClientPhase,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            session_id: None,
            messages: Vec::new(),
            phase: ClientPhase::Idle,
        }
    }
}

impl ChatState {
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, ClientPhase::Sending(_))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            ClientPhase::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Owns the single client state and publishes every change to subscribers.
///
/// A send appends the user's message before the round trip and never takes
/// it back: on failure the state moves to `Error` with the message still shown.
pub struct ChatController<A> {
    api: A,
    state: watch::Sender<ChatState>,
}

impl<A: ChatApi> ChatController<A> {
    pub fn new(api: A) -> Self {
        let (state, _) = watch::channel(ChatState::default());
        Self { api, state }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn state(&self) -> ChatState {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every transition; the render loop hangs off this.
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    pub async fn initialize_session(&self) {
        self.begin(PendingRequest::CreateSession);

        match self.api.create_session().await {
            Ok(created) => self.state.send_modify(|s| {
                s.session_id = Some(created.session_id);
                s.messages = created.messages;
                s.phase = ClientPhase::Idle;
            }),
            Err(e) => self.fail(e.to_string()),
        }
    }

    pub async fn send_message(&self, text: &str) {
        if self.state.borrow().session_id.is_none() {
            self.initialize_session().await;
        }
        let session_id = self.state.borrow().session_id;
        let Some(session_id) = session_id else {
            if self.state.borrow().error().is_none() {
                self.fail("Failed to create session".to_string());
            }
            return;
        };

        let optimistic = Message {
            id: Uuid::new_v4(),
            session_id,
            role: MessageRole::User,
            content: text.to_string(),
            timestamp: Utc::now(),
        };
        self.state.send_modify(|s| {
            s.messages.push(optimistic);
            s.phase = ClientPhase::Sending(PendingRequest::Message);
        });

        match self.api.send_message(session_id, text).await {
            Ok(reply) => self.state.send_modify(|s| {
                s.messages.push(reply);
                s.phase = ClientPhase::Idle;
            }),
            Err(e) => self.fail(e.to_string()),
        }
    }

    pub async fn clear_chat(&self) {
        let session_id = self.state.borrow().session_id;
        let Some(session_id) = session_id else {
            return;
        };
        self.begin(PendingRequest::Clear);

        match self.api.clear_session(session_id).await {
            Ok(messages) => self.state.send_modify(|s| {
                s.messages = messages;
                s.phase = ClientPhase::Idle;
            }),
            Err(e) => self.fail(e.to_string()),
        }
    }

    pub fn dismiss_error(&self) {
        self.state.send_if_modified(|s| {
            if s.error().is_some() {
                s.phase = ClientPhase::Idle;
                true
            } else {
                false
            }
        });
    }

    fn begin(&self, request: PendingRequest) {
        self.state.send_modify(|s| s.phase = ClientPhase::Sending(request));
    }

    fn fail(&self, message: String) {
        tracing::warn!(error = %message, "chat request failed");
        self.state.send_modify(|s| s.phase = ClientPhase::Error(message));
    }
}
