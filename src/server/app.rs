use crate::breakdown::{LlmSubtaskGenerator, SubtaskGenerator};
use crate::config::AppConfig;
use crate::db::{create_pool, run_migrations};
use crate::llm::{client_from_config, CompletionClient};
use crate::suggestions::{GenerationLimiter, InMemoryRateLimiter};
use anyhow::{Context, Result};
use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::models::ApiError;

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub llm: Arc<dyn CompletionClient>,
    pub limiter: Arc<dyn GenerationLimiter>,
    pub subtask_generator: Arc<dyn SubtaskGenerator>,
}

impl AppState {
    /// Wire the LLM client, subtask generator and limiter from resolved config
    pub fn from_config(db_pool: SqlitePool, config: &AppConfig) -> crate::error::Result<Self> {
        let llm = client_from_config(config.llm.clone())?;
        Ok(Self {
            db_pool,
            subtask_generator: Arc::new(LlmSubtaskGenerator::new(llm.clone())),
            limiter: Arc::new(InMemoryRateLimiter::from_limits(config.suggestions)),
            llm,
        })
    }
}

pub struct PlanGenieServer {
    port: u16,
    db_path: PathBuf,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

impl PlanGenieServer {
    pub fn new(port: u16, db_path: PathBuf) -> Self {
        Self { port, db_path }
    }

    pub async fn run(self) -> Result<()> {
        let db_pool = create_pool(&self.db_path)
            .await
            .context("Failed to open database")?;
        run_migrations(&db_pool)
            .await
            .context("Failed to run migrations")?;

        let config = AppConfig::resolve(&db_pool)
            .await
            .context("Failed to resolve configuration")?;
        let state = AppState::from_config(db_pool, &config)?;

        let app = create_router(state);

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        tracing::info!(address = %addr, database = %self.db_path.display(), "PlanGenie server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        tracing::info!("PlanGenie server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    use super::routes;

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", routes::api_routes())
        .fallback(not_found_handler)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "plangenie".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError {
            code: "NOT_FOUND".to_string(),
            message: "The requested resource was not found".to_string(),
            details: None,
        }),
    )
}
