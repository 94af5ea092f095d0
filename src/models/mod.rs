pub mod api;
pub mod message;

pub use api::{ApiResponse, ErrorResponse, SendMessageRequest, SessionCreated};
pub use message::{Message, MessageRole};
