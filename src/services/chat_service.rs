// src/services/chat_service.rs
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ChatError;
use crate::models::{Message, MessageRole};
use crate::services::message_store::MessageStore;
use crate::services::model_gateway::{generate_greeting, ModelGateway};

/// Session lifecycle over a message store and a model gateway.
///
/// Writes are append-only and not transactional: a failed completion leaves
/// the user's message in place, and concurrent sends on one session may
/// interleave.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn MessageStore>,
    gateway: Arc<dyn ModelGateway>,
}

impl ChatService {
    pub fn new(store: Arc<dyn MessageStore>, gateway: Arc<dyn ModelGateway>) -> Self {
        Self { store, gateway }
    }

    pub async fn create_session(&self) -> Result<Uuid, ChatError> {
        let session_id = Uuid::new_v4();
        self.seed_greeting(session_id).await?;

        tracing::info!(session_id = %session_id, "created chat session");
        Ok(session_id)
    }

    pub async fn get_messages(&self, session_id: Uuid) -> Result<Vec<Message>, ChatError> {
        let messages = self.store.list(session_id).await.map_err(|e| {
            tracing::error!(session_id = %session_id, error = %e, "Error fetching messages");
            e
        })?;

        if messages.is_empty() {
            return Err(ChatError::NotFound(session_id));
        }
        Ok(messages)
    }

    pub async fn process_message(&self, session_id: Uuid, text: &str) -> Result<Message, ChatError> {
        self.save_message(session_id, MessageRole::User, text).await?;

        let history = self.get_messages(session_id).await?;

        let reply = self.gateway.generate_response(&history).await.map_err(|e| {
            tracing::warn!(session_id = %session_id, error = %e, "model gateway failed; user message kept");
            ChatError::from(e)
        })?;

        self.save_message(session_id, MessageRole::Assistant, &reply).await
    }

    pub async fn clear_session(&self, session_id: Uuid) -> Result<bool, ChatError> {
        let removed = self.store.delete_all(session_id).await?;
        self.seed_greeting(session_id).await?;

        tracing::info!(session_id = %session_id, removed, "cleared chat session");
        Ok(true)
    }

    pub async fn delete_session(&self, session_id: Uuid) -> Result<bool, ChatError> {
        let removed = self.store.delete_all(session_id).await?;

        tracing::info!(session_id = %session_id, removed, "deleted chat session");
        Ok(removed > 0)
    }

    async fn seed_greeting(&self, session_id: Uuid) -> Result<Message, ChatError> {
        let greeting = generate_greeting();
        self.save_message(session_id, greeting.role, &greeting.content).await
    }

    async fn save_message(&self, session_id: Uuid, role: MessageRole, content: &str) -> Result<Message, ChatError> {
        self.store
            .insert(Message::new(session_id, role, content))
            .await
            .map_err(|e| {
                tracing::error!(session_id = %session_id, error = %e, "Error saving message");
                ChatError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::services::message_store::InMemoryMessageStore;
    use crate::services::model_gateway::GREETING;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a canned answer and records the history it was given.
    struct ScriptedGateway {
        reply: Result<String, fn() -> GatewayError>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedGateway {
        fn replying(text: &str) -> Self {
            Self { reply: Ok(text.to_string()), seen: Mutex::new(Vec::new()) }
        }

        fn failing(error: fn() -> GatewayError) -> Self {
            Self { reply: Err(error), seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn generate_response(&self, history: &[Message]) -> Result<String, GatewayError> {
            self.seen.lock().unwrap().push(history.to_vec());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn service(gateway: Arc<ScriptedGateway>) -> ChatService {
        ChatService::new(Arc::new(InMemoryMessageStore::new()), gateway)
    }

    #[tokio::test]
    async fn new_session_holds_only_the_greeting() {
        let chat = service(Arc::new(ScriptedGateway::replying("ok")));
        let session_id = chat.create_session().await.unwrap();

        let messages = chat.get_messages(session_id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::Assistant);
        assert_eq!(messages[0].content, GREETING);
        assert_eq!(messages[0].session_id, session_id);
    }

    #[tokio::test]
    async fn process_message_appends_user_then_assistant() {
        let gateway = Arc::new(ScriptedGateway::replying("We are open 9 to 5."));
        let chat = service(gateway.clone());
        let session_id = chat.create_session().await.unwrap();

        let reply = chat.process_message(session_id, "What are your hours?").await.unwrap();
        assert_eq!(reply.role, MessageRole::Assistant);
        assert_eq!(reply.content, "We are open 9 to 5.");

        let messages = chat.get_messages(session_id).await.unwrap();
        let turns: Vec<_> = messages.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(
            turns,
            vec![
                (MessageRole::Assistant, GREETING),
                (MessageRole::User, "What are your hours?"),
                (MessageRole::Assistant, "We are open 9 to 5."),
            ]
        );
        assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        // The gateway saw the full history including the new user turn.
        let seen = gateway.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[0][1].content, "What are your hours?");
    }

    #[tokio::test]
    async fn gateway_failure_keeps_the_user_message() {
        let chat = service(Arc::new(ScriptedGateway::failing(|| GatewayError::RateLimited)));
        let session_id = chat.create_session().await.unwrap();

        let err = chat.process_message(session_id, "hello").await.unwrap_err();
        assert!(matches!(err, ChatError::RateLimited(_)));

        let messages = chat.get_messages(session_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, MessageRole::User);
    }

    #[tokio::test]
    async fn unknown_and_deleted_sessions_are_not_found() {
        let chat = service(Arc::new(ScriptedGateway::replying("ok")));

        let never = Uuid::new_v4();
        assert!(matches!(chat.get_messages(never).await, Err(ChatError::NotFound(id)) if id == never));

        let session_id = chat.create_session().await.unwrap();
        assert!(chat.delete_session(session_id).await.unwrap());
        assert!(matches!(chat.get_messages(session_id).await, Err(ChatError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let chat = service(Arc::new(ScriptedGateway::replying("ok")));
        assert!(!chat.delete_session(Uuid::new_v4()).await.unwrap());

        let session_id = chat.create_session().await.unwrap();
        assert!(chat.delete_session(session_id).await.unwrap());
        assert!(!chat.delete_session(session_id).await.unwrap());
    }

    #[tokio::test]
    async fn clear_leaves_a_single_fresh_greeting() {
        let chat = service(Arc::new(ScriptedGateway::replying("sure")));
        let session_id = chat.create_session().await.unwrap();
        let first_greeting = chat.get_messages(session_id).await.unwrap()[0].id;

        for text in ["one", "two", "three"] {
            chat.process_message(session_id, text).await.unwrap();
        }
        assert_eq!(chat.get_messages(session_id).await.unwrap().len(), 7);

        assert!(chat.clear_session(session_id).await.unwrap());
        let messages = chat.get_messages(session_id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, GREETING);
        assert_ne!(messages[0].id, first_greeting);
    }

    #[tokio::test]
    async fn clearing_an_unknown_session_seeds_it() {
        let chat = service(Arc::new(ScriptedGateway::replying("ok")));
        let session_id = Uuid::new_v4();

        assert!(chat.clear_session(session_id).await.unwrap());
        assert_eq!(chat.get_messages(session_id).await.unwrap().len(), 1);
    }
}
