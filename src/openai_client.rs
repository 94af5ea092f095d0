use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::OpenAiConfig;
use crate::error::GatewayError;
use crate::models::{Message, MessageRole};
use crate::services::model_gateway::{transform_messages, ChatTurn, ModelGateway};

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1000;

/// Chat-completions client. One attempt per call; failures are classified, never retried.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    system_prompt: String,
    timeout: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatTurn>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            timeout: config.timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// System instruction first, then the stored history as-is.
    pub fn build_request(&self, history: &[Message]) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatTurn {
            role: MessageRole::System,
            content: self.system_prompt.clone(),
        });
        messages.extend(transform_messages(history));

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }

    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse, GatewayError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "OpenAI API request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Upstream(format!("request timed out after {}s", self.timeout.as_secs()))
                } else {
                    GatewayError::Upstream(format!("Request error: {}", e))
                }
            })?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| GatewayError::Upstream(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(classify_status(status, &response_text));
        }

        serde_json::from_str(&response_text)
            .map_err(|e| GatewayError::Upstream(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl ModelGateway for OpenAiClient {
    async fn generate_response(&self, history: &[Message]) -> Result<String, GatewayError> {
        let request = self.build_request(history);

        let result = self.complete(&request).await.and_then(|completion| {
            if let Some(usage) = &completion.usage {
                tracing::debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    total_tokens = usage.total_tokens,
                    "OpenAI token usage"
                );
            }
            extract_reply(completion)
        });

        // Classified failures are operational.
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Error calling OpenAI API");
        }
        result
    }
}

/// Maps a non-success completion status to a gateway error.
pub fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return GatewayError::RateLimited;
    }

    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    GatewayError::Upstream(format!("{} {}", status.as_u16(), detail))
}

/// First choice's text, or `Empty` when there is nothing to say.
pub fn extract_reply(completion: ChatCompletionResponse) -> Result<String, GatewayError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(GatewayError::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn client() -> OpenAiClient {
        OpenAiClient::new(&OpenAiConfig {
            api_key: "sk-test".to_string(),
            model: "gpt-test".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(1),
            system_prompt: "Be brief.".to_string(),
        })
    }

    #[test]
    fn request_prepends_system_prompt_and_fixes_sampling() {
        let session_id = Uuid::new_v4();
        let history = vec![Message::new(session_id, MessageRole::User, "hello")];

        let request = client().build_request(&history);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert_eq!(request.messages[0].content, "Be brief.");
        assert_eq!(request.messages[1].content, "hello");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-test");
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["frequency_penalty"], 0.0);
        assert_eq!(json["presence_penalty"], 0.0);
        assert!((json["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            GatewayError::RateLimited
        ));

        match classify_status(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"context length exceeded"}}"#,
        ) {
            GatewayError::Upstream(detail) => assert_eq!(detail, "400 context length exceeded"),
            other => panic!("unexpected {:?}", other),
        }

        match classify_status(StatusCode::INTERNAL_SERVER_ERROR, "<html>") {
            GatewayError::Upstream(detail) => assert_eq!(detail, "500 Internal Server Error"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn blank_completion_is_empty() {
        let completion: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert!(matches!(extract_reply(completion), Err(GatewayError::Empty)));

        let completion: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_reply(completion), Err(GatewayError::Empty)));

        let completion: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"We open at 9."}}]}"#).unwrap();
        assert_eq!(extract_reply(completion).unwrap(), "We open at 9.");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_an_upstream_error() {
        let history = vec![Message::new(Uuid::new_v4(), MessageRole::User, "hi")];
        let err = client().generate_response(&history).await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream(_)));
    }
}
