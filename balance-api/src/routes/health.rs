//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use balance_embedding::StoreStats;
use serde::Serialize;
use tracing::error;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<StoreStats>,
    semantic_search: bool,
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let semantic_search = state.insight_service.has_embedder();

    match state.store.get_stats() {
        Ok(stats) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                store: Some(stats),
                semantic_search,
            }),
        ),
        Err(e) => {
            error!("Transaction store health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded".to_string(),
                    store: None,
                    semantic_search,
                }),
            )
        }
    }
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
