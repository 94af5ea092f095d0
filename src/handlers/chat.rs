// src/handlers/chat.rs
use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ChatError;
use crate::models::{ApiResponse, SendMessageRequest, SessionCreated};
use crate::AppState;

pub fn chat_routes() -> Router {
    Router::new()
        .route("/api/chat/session", post(create_session))
        .route(
            "/api/chat/session/:session_id",
            get(get_session_messages).delete(delete_session),
        )
        .route("/api/chat/session/:session_id/message", post(send_message))
        .route("/api/chat/session/:session_id/clear", delete(clear_session))
}

/// Accepts only the canonical hyphenated UUID form.
pub fn parse_session_id(raw: &str) -> Result<Uuid, ChatError> {
    if raw.len() != 36 {
        return Err(invalid_session_id());
    }
    Uuid::try_parse(raw).map_err(|_| invalid_session_id())
}

fn invalid_session_id() -> ChatError {
    ChatError::Validation("Invalid session ID format".to_string())
}

/// POST /api/chat/session
async fn create_session(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ChatError> {
    let session_id = state.chat_service.create_session().await?;
    let messages = state.chat_service.get_messages(session_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(SessionCreated { session_id, messages })),
    ))
}

/// GET /api/chat/session/:session_id
async fn get_session_messages(
    Path(session_id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ChatError> {
    let session_id = parse_session_id(&session_id)?;
    let messages = state.chat_service.get_messages(session_id).await?;

    Ok(Json(ApiResponse::ok(messages)))
}

/// POST /api/chat/session/:session_id/message
async fn send_message(
    Path(session_id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ChatError> {
    let session_id = parse_session_id(&session_id)?;

    let Json(request) = payload.map_err(|rejection| {
        ChatError::Validation(format!("Message validation failed: {}", rejection.body_text()))
    })?;
    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ChatError::Validation("Message cannot be empty".to_string()))?;

    let reply = state.chat_service.process_message(session_id, &message).await?;

    Ok(Json(ApiResponse::ok(reply)))
}

/// DELETE /api/chat/session/:session_id/clear
async fn clear_session(
    Path(session_id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ChatError> {
    let session_id = parse_session_id(&session_id)?;

    let success = state.chat_service.clear_session(session_id).await?;
    let messages = state.chat_service.get_messages(session_id).await?;

    Ok(Json(ApiResponse {
        success,
        data: Some(messages),
        message: None,
    }))
}

/// DELETE /api/chat/session/:session_id
async fn delete_session(
    Path(session_id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ChatError> {
    let session_id = parse_session_id(&session_id)?;

    let success = state.chat_service.delete_session(session_id).await?;
    let message = if success {
        "Session deleted successfully"
    } else {
        "Session not found or already deleted"
    };

    Ok(Json(ApiResponse::status(success, message)))
}
