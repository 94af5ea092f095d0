use std::net::SocketAddr;
use std::sync::Arc;

use support_chat::config::AppConfig;
use support_chat::handlers::app_router;
use support_chat::middleware::RateLimiter;
use support_chat::openai_client::OpenAiClient;
use support_chat::services::{ChatService, InMemoryMessageStore, MessageStore, ModelGateway, PgMessageStore};
use support_chat::{db, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging()?;

    let config = AppConfig::from_env()?;

    let store: Arc<dyn MessageStore> = match config.database_url.as_deref() {
        Some(database_url) => {
            let db_pool = db::create_pool(database_url, config.db_max_connections).await?;
            tracing::info!("PostgreSQL message store ready");
            Arc::new(PgMessageStore::new(db_pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set. Messages are kept in memory and lost on restart.");
            Arc::new(InMemoryMessageStore::new())
        }
    };

    let openai = OpenAiClient::new(&config.openai);
    tracing::info!(model = %openai.model(), "OpenAI client initialized");
    let gateway: Arc<dyn ModelGateway> = Arc::new(openai);

    let shared_state = Arc::new(AppState {
        chat_service: ChatService::new(store, gateway),
    });

    let rate_limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window);
    tracing::info!(
        max_requests = config.rate_limit_max,
        window_secs = config.rate_limit_window.as_secs(),
        "Rate limiting /api per client IP"
    );

    let app = app_router(shared_state, rate_limiter, &config.client_url);

    // ConnectInfo provides the client address for rate limiting and logs
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], config.port))).await?;
    tracing::info!(
        "Server running in {} mode on {}",
        if cfg!(debug_assertions) { "development" } else { "production" },
        listener.local_addr()?
    );
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,support_chat=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,support_chat=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    // JSON for log aggregation, human-readable otherwise
    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init()?;

    tracing::info!("Support chat starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log level: {}", log_level);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
