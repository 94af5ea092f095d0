use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Per-client sliding-window limiter: at most `max_requests` in any `window`.
#[derive(Clone)]
pub struct RateLimiter {
    // IP -> instants of admitted requests still inside the window, oldest first
    clients: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    max_requests: u32,
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_duration: Duration) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window_duration,
        }
    }

    pub fn window(&self) -> Duration {
        self.window_duration
    }

    /// Admits the request, or returns how long until a slot frees up.
    pub fn check_rate_limit(&self, client_ip: &str) -> Result<(), Duration> {
        self.check_at(client_ip, Instant::now())
    }

    pub fn check_at(&self, client_ip: &str, now: Instant) -> Result<(), Duration> {
        let mut clients = self.clients();
        let hits = clients.entry(client_ip.to_string()).or_default();

        while let Some(&oldest) = hits.front() {
            if now.duration_since(oldest) >= self.window_duration {
                hits.pop_front();
            } else {
                break;
            }
        }

        if hits.len() >= self.max_requests as usize {
            let retry_after = hits
                .front()
                .map(|&oldest| self.window_duration.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(self.window_duration);
            return Err(retry_after);
        }

        hits.push_back(now);
        Ok(())
    }

    /// Drops clients with no requests left inside the window.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.clients().retain(|_, hits| {
            hits.back()
                .is_some_and(|&latest| now.duration_since(latest) < self.window_duration)
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients().len()
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if let Err(retry_after) = rate_limiter.check_rate_limit(&client_ip) {
        tracing::warn!(client_ip = %client_ip, "Rate limit exceeded");
        let minutes = rate_limiter.window().as_secs().div_ceil(60);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "success": false,
                "message": format!(
                    "Too many requests from this IP, please try again after {} minutes",
                    minutes
                ),
                "retry_after": retry_after.as_secs().max(1)
            })),
        )
            .into_response();
    }

    // Occasionally clean up expired entries
    if rand::random::<u8>() < 10 {
        rate_limiter.cleanup_expired();
    }

    next.run(request).await
}
