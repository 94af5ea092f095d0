// lib.rs - Customer support chat service
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod openai_client;
pub mod services;

pub use error::{ChatError, GatewayError, StoreError};
pub use services::ChatService;

/// Shared state handed to every handler through an `Extension`.
pub struct AppState {
    pub chat_service: ChatService,
}
