use anyhow::{Context, Result};
use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use sqlx::SqlitePool;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::auth::OWNER_HEADER;
use super::models::HealthResponse;
use crate::db::{create_pool, run_migrations};

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
}

/// REST server instance
pub struct DaybookServer {
    port: u16,
    db_path: PathBuf,
}

impl DaybookServer {
    pub fn new(port: u16, db_path: PathBuf) -> Self {
        Self { port, db_path }
    }

    /// Open the database, bind and serve until the process is stopped
    pub async fn run(self) -> Result<()> {
        let db_pool = create_pool(&self.db_path)
            .await
            .with_context(|| format!("Failed to open database {}", self.db_path.display()))?;
        run_migrations(&db_pool)
            .await
            .context("Failed to run database migrations")?;

        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        tracing::info!("Daybook server listening on {}", addr);
        tracing::info!("Database: {}", self.db_path.display());

        serve(listener, db_pool).await
    }
}

/// Serve the API on an already-bound listener
pub async fn serve(listener: TcpListener, db_pool: SqlitePool) -> Result<()> {
    let app = create_router(AppState { db_pool });
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    use super::routes;

    let api_routes = Router::new()
        .route("/health", get(health_handler))
        .merge(routes::api_routes());

    Router::new()
        .nest("/api", api_routes)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::HeaderName::from_static(OWNER_HEADER),
                ]),
        )
        .layer(TraceLayer::new_for_http())
}

/// Health check handler
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// 404 Not Found handler
async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "code": "NOT_FOUND",
            "message": "Not found"
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "1.0.0".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("1.0.0"));
    }
}
