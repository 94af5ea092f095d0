// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use support_chat::handlers::app_router;
use support_chat::middleware::RateLimiter;
use support_chat::models::Message;
use support_chat::services::{ChatService, InMemoryMessageStore, MessageStore, ModelGateway};
use support_chat::{AppState, GatewayError, StoreError};

#[derive(Clone, Copy)]
pub enum StubReply {
    Text(&'static str),
    RateLimited,
    Empty,
    Failed,
}

pub struct StubGateway {
    reply: StubReply,
    pub calls: AtomicUsize,
}

impl StubGateway {
    pub fn new(reply: StubReply) -> Arc<Self> {
        Arc::new(Self { reply, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl ModelGateway for StubGateway {
    async fn generate_response(&self, _history: &[Message]) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            StubReply::Text(text) => Ok(text.to_string()),
            StubReply::RateLimited => Err(GatewayError::RateLimited),
            StubReply::Empty => Err(GatewayError::Empty),
            StubReply::Failed => Err(GatewayError::Upstream("500 Internal Server Error".to_string())),
        }
    }
}

/// In-memory store that counts every call reaching it.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryMessageStore,
    pub calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageStore for CountingStore {
    async fn insert(&self, message: Message) -> Result<Message, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(message).await
    }

    async fn list(&self, session_id: Uuid) -> Result<Vec<Message>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list(session_id).await
    }

    async fn delete_all(&self, session_id: Uuid) -> Result<u64, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_all(session_id).await
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<CountingStore>,
    pub gateway: Arc<StubGateway>,
}

impl TestApp {
    pub fn new(reply: StubReply) -> Self {
        Self::with_rate_limit(reply, 1000)
    }

    pub fn with_rate_limit(reply: StubReply, max_requests: u32) -> Self {
        let store = Arc::new(CountingStore::default());
        let gateway = StubGateway::new(reply);
        let state = Arc::new(AppState {
            chat_service: ChatService::new(store.clone(), gateway.clone()),
        });
        let router = app_router(
            state,
            RateLimiter::new(max_requests, Duration::from_secs(60)),
            "http://localhost:3000",
        );
        Self { router, store, gateway }
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Creates a session through the API and returns its id.
    pub async fn create_session(&self) -> String {
        let (status, body) = self.request("POST", "/api/chat/session", None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["sessionId"].as_str().unwrap().to_string()
    }
}

/// Formatted log output collected by a thread-local subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn lines_at(&self, level: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.split_whitespace().any(|word| word == level))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Captures events matching `filter` on the current thread until the guard drops.
/// Use from a current-thread `#[tokio::test]`.
pub fn capture_logs(filter: &str) -> (DefaultGuard, CapturedLogs) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    (tracing::subscriber::set_default(subscriber), logs)
}
