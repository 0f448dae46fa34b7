//! Semantic search and purchase prediction endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use balance_core::{PurchasePrediction, SimilarityResult};
use serde::Deserialize;

use crate::error::{bounded, ApiError};
use crate::AppState;

/// Query parameters for semantic search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search text
    pub q: String,
    pub user_id: String,
    pub limit: Option<usize>,
}

/// Query parameters for purchase prediction
#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    pub user_id: String,
    pub top_k: Option<usize>,
}

/// Create insight routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/semantic-search", get(semantic_search))
        .route("/predict", get(predict_purchases))
}

/// GET /api/semantic-search - Transactions most similar to free text
async fn semantic_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<SimilarityResult>>, ApiError> {
    let limit = bounded("limit", params.limit, 5, 1, 50)?;
    let results = state
        .insight_service
        .semantic_search(&params.q, &params.user_id, limit)
        .await?;
    Ok(Json(results))
}

/// GET /api/predict - Upcoming purchases, soonest first
async fn predict_purchases(
    State(state): State<AppState>,
    Query(params): Query<PredictQuery>,
) -> Result<Json<Vec<PurchasePrediction>>, ApiError> {
    let top_k = bounded("top_k", params.top_k, 3, 1, 10)?;
    let predictions = state
        .insight_service
        .predict_purchases(&params.user_id, top_k)?;
    Ok(Json(predictions))
}
