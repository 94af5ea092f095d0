use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ApiResponse, ErrorResponse, Message, SessionCreated};

const UNEXPECTED: &str = "An unexpected error occurred";

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with an error envelope (or garbage).
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("{0}")]
    Transport(String),
}

/// The chat endpoints as seen from a client.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn create_session(&self) -> Result<SessionCreated, ClientError>;
    async fn get_messages(&self, session_id: Uuid) -> Result<Vec<Message>, ClientError>;
    async fn send_message(&self, session_id: Uuid, text: &str) -> Result<Message, ClientError>;
    async fn clear_session(&self, session_id: Uuid) -> Result<Vec<Message>, ClientError>;
    async fn delete_session(&self, session_id: Uuid) -> Result<bool, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: Client,
    base_url: String,
}

impl HttpChatApi {
    /// `base_url` is the API root, e.g. `http://localhost:5000/api`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn session_url(&self, session_id: Uuid) -> String {
        format!("{}/chat/session/{}", self.base_url, session_id)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<ApiResponse<T>, ClientError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Transport("Request timed out".to_string())
            } else {
                ClientError::Transport(UNEXPECTED.to_string())
            }
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&bytes)
                .map(|body| body.message)
                .unwrap_or_else(|_| UNEXPECTED.to_string());
            return Err(ClientError::Api { status: status.as_u16(), message });
        }

        serde_json::from_slice(&bytes).map_err(|e| ClientError::Api {
            status: status.as_u16(),
            message: format!("Malformed response: {}", e),
        })
    }

    async fn data<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let envelope = self.execute::<T>(request).await?;
        envelope.data.ok_or_else(|| ClientError::Api {
            status: 200,
            message: envelope.message.unwrap_or_else(|| UNEXPECTED.to_string()),
        })
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn create_session(&self) -> Result<SessionCreated, ClientError> {
        self.data(self.client.post(format!("{}/chat/session", self.base_url)))
            .await
    }

    async fn get_messages(&self, session_id: Uuid) -> Result<Vec<Message>, ClientError> {
        self.data(self.client.get(self.session_url(session_id))).await
    }

    async fn send_message(&self, session_id: Uuid, text: &str) -> Result<Message, ClientError> {
        let url = format!("{}/message", self.session_url(session_id));
        self.data(self.client.post(url).json(&serde_json::json!({ "message": text })))
            .await
    }

    async fn clear_session(&self, session_id: Uuid) -> Result<Vec<Message>, ClientError> {
        let url = format!("{}/clear", self.session_url(session_id));
        self.data(self.client.delete(url)).await
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<bool, ClientError> {
        let envelope = self
            .execute::<serde_json::Value>(self.client.delete(self.session_url(session_id)))
            .await?;
        Ok(envelope.success)
    }
}
