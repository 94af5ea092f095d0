// src/handlers/mod.rs
pub mod chat;
pub mod health;

use axum::{
    http::{header, HeaderValue, Method},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::middleware::{rate_limit_middleware, request_logging_middleware, RateLimiter};
use crate::AppState;

/// Full HTTP surface: chat API behind the rate limiter, health probe, 404 fallback.
pub fn app_router(state: Arc<AppState>, rate_limiter: RateLimiter, client_url: &str) -> Router {
    let api = chat::chat_routes().layer(axum::middleware::from_fn_with_state(
        rate_limiter,
        rate_limit_middleware,
    ));

    Router::new()
        .merge(api)
        .merge(health::health_routes())
        .fallback(health::route_not_found)
        .layer(axum::middleware::from_fn(request_logging_middleware))
        .layer(cors_layer(client_url))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(Extension(state))
}

fn cors_layer(client_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    match HeaderValue::from_str(client_url) {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!(client_url = %client_url, error = %e, "Invalid CLIENT_URL; cross-origin requests disabled");
            cors
        }
    }
}
