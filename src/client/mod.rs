//! Client half of the chat: an API binding for the HTTP endpoints and the
//! state controller a front end renders from.
pub mod api;
pub mod state;

pub use api::{ChatApi, ClientError, HttpChatApi};
pub use state::{ChatController, ChatState, ClientPhase, PendingRequest};
