use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;

pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}

/// GET /health - liveness probe
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK", "message": "Server is running" }))
}

pub async fn route_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
}
