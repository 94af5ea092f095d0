// src/services/model_gateway.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::models::{Message, MessageRole};

pub const GREETING: &str = "Hello! I'm your customer support assistant. How can I help you today?";

/// A `{role, content}` pair as the completion API expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

/// Boundary to the hosted language model.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Produces the assistant reply for an ordered conversation history.
    async fn generate_response(&self, history: &[Message]) -> Result<String, GatewayError>;
}

/// The fixed assistant message used to seed new and cleared sessions.
pub fn generate_greeting() -> ChatTurn {
    ChatTurn {
        role: MessageRole::Assistant,
        content: GREETING.to_string(),
    }
}

pub fn transform_messages(history: &[Message]) -> Vec<ChatTurn> {
    history
        .iter()
        .map(|message| ChatTurn {
            role: message.role,
            content: message.content.clone(),
        })
        .collect()
}
