//! News Flow Server - HTTP adapter for the news pipeline
//!
//! Exposes run submission and run inspection over a RESTful HTTP API via
//! axum. Runs execute in background tasks on the same `AppState` the CLI
//! uses, so checkpoints written here can be resumed from the CLI and the
//! other way round.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use newsflow_core::{AppState, AppStateInner, Database, FlowConfig};

/// Configuration for the News Flow HTTP server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub flow: FlowConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3210,
            flow: FlowConfig::default(),
        }
    }
}

/// Create a shared `AppState` backed by the LLM crews in `config`.
pub async fn create_app_state(config: FlowConfig) -> Result<AppState, String> {
    let db = Database::open(&config.database_path)
        .map_err(|e| format!("Failed to open database: {}", e))?;

    let inner = AppStateInner::with_llm_crews(db, config)
        .map_err(|e| format!("Failed to load crews: {}", e))?;

    Ok(Arc::new(inner))
}

/// Start the HTTP server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // A host binary may already have installed a subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsflow_server=info,tower_http=info".into()),
        )
        .try_init();

    tracing::info!(
        "Starting News Flow server on {}:{}",
        config.host,
        config.port
    );

    let state = create_app_state(config.flow.clone()).await?;

    start_server_with_state(config, state).await
}

/// Build the router with all routes and layers applied.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server with a pre-built `AppState`.
///
/// Useful when the state is shared with other consumers or built around a
/// custom collaborator.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("News Flow server listening on {}", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "newsflow-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
