use std::sync::Arc;
use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gns_auth_sessions::api::{self, AppState, PUBLIC_KEY_HEADER, SESSION_HEADER};
use gns_auth_sessions::{
    BrowserSessionStore, Error, IdentityDirectory, MemoryStore, PairingEngine, ReaperHandle,
    Result, ServerConfig, SqliteStore,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gns_auth_sessions=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, code = e.code(), "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Persistence ---
    let (sessions, identities): (Arc<dyn BrowserSessionStore>, Arc<dyn IdentityDirectory>) =
        match &config.database_path {
            Some(path) => {
                let store = Arc::new(SqliteStore::open(path)?);
                tracing::info!(path = %path.display(), "SQLite store opened");
                (store.clone() as Arc<dyn BrowserSessionStore>, store as Arc<dyn IdentityDirectory>)
            }
            None => {
                tracing::warn!("DATABASE_PATH not set, browser sessions are kept in memory");
                let store = Arc::new(MemoryStore::new());
                (store.clone() as Arc<dyn BrowserSessionStore>, store as Arc<dyn IdentityDirectory>)
            }
        };

    // --- Engine ---
    let engine = PairingEngine::builder(config.pairing.clone())
        .browser_sessions(sessions)
        .identities(identities)
        .build()?;
    let reaper = ReaperHandle::spawn(Arc::clone(&engine));
    tracing::info!(
        ttl_secs = config.pairing.session_ttl_seconds,
        reaper_secs = config.pairing.reaper_interval_seconds,
        "Pairing engine started"
    );

    // --- Router ---
    let app = api::router(AppState::new(engine))
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(build_cors_layer(&config)?);

    // --- Start server ---
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    reaper.shutdown().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// CORS for the configured browser origins. An unparseable origin fails
/// startup.
fn build_cors_layer(config: &ServerConfig) -> Result<CorsLayer> {
    let origins = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| Error::Config(format!("Invalid CORS origin '{o}': {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(SESSION_HEADER),
            HeaderName::from_static(PUBLIC_KEY_HEADER),
        ])
        .max_age(Duration::from_secs(3600)))
}
