// src/services/mod.rs
pub mod chat_service;
pub mod message_store;
pub mod model_gateway;

pub use chat_service::ChatService;
pub use message_store::{InMemoryMessageStore, MessageStore, PgMessageStore};
pub use model_gateway::{generate_greeting, ModelGateway};
