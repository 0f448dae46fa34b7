//! Transaction ingestion and listing endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use balance_core::{NewTransaction, PersistOutcome, TransactionRecord, UserReply};
use balance_embedding::CategoryStat;
use balance_services::IngestReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{bounded, ApiError};
use crate::AppState;

/// Query parameters for the activity feed
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub user_id: String,
    pub limit: Option<usize>,
}

/// Query parameters for category stats
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub user_id: String,
    /// Window size in days
    pub days: Option<u32>,
}

/// Query parameters for the simplified transaction listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Feed entry (embedding omitted)
#[derive(Debug, Serialize)]
struct FeedItem {
    id: String,
    merchant: String,
    item_text: String,
    category: Option<String>,
    amount_cents: Option<i64>,
    occurred_at: DateTime<Utc>,
}

impl From<TransactionRecord> for FeedItem {
    fn from(record: TransactionRecord) -> Self {
        Self {
            id: record.id,
            merchant: record.merchant,
            item_text: record.item_text,
            category: record.category,
            amount_cents: record.amount_cents,
            occurred_at: record.occurred_at,
        }
    }
}

/// Transaction in the shape the mobile app expects
#[derive(Debug, Serialize)]
struct AppTransaction {
    id: String,
    item: String,
    amount: Option<f64>,
    date: DateTime<Utc>,
    category: Option<String>,
}

impl From<TransactionRecord> for AppTransaction {
    fn from(record: TransactionRecord) -> Self {
        Self {
            amount: record.amount(),
            id: record.id,
            item: record.item_text,
            date: record.occurred_at,
            category: record.category,
        }
    }
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    status: &'static str,
    persisted: bool,
    #[serde(flatten)]
    report: IngestReport,
}

/// Create transaction routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", post(upsert_transaction))
        .route("/reply", post(upsert_reply))
        .route("/feed", get(get_feed))
        .route("/stats/category", get(get_category_stats))
        .route("/user/{user_id}/transactions", get(get_user_transactions))
}

/// POST /api/transactions - Ingest a transaction
async fn upsert_transaction(
    State(state): State<AppState>,
    Json(txn): Json<NewTransaction>,
) -> Result<Json<IngestResponse>, ApiError> {
    let report = state.ingest_service.ingest(txn).await?;

    if let PersistOutcome::PersistFailedFallbackWritten { path, .. } = &report.outcome {
        info!("Transaction {} written to fallback file {:?}", report.id, path);
    }

    Ok(Json(IngestResponse {
        status: "ok",
        persisted: report.outcome.is_persisted(),
        report,
    }))
}

/// POST /api/reply - Store a user's reply to a notification
async fn upsert_reply(
    State(state): State<AppState>,
    Json(reply): Json<UserReply>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.ingest_service.record_reply(&reply)?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "id": reply.id
    })))
}

/// GET /api/feed - Recent transactions, newest first
async fn get_feed(
    State(state): State<AppState>,
    Query(params): Query<FeedQuery>,
) -> Result<Json<Vec<FeedItem>>, ApiError> {
    let limit = bounded("limit", params.limit, 20, 1, 100)?;
    let records = state
        .insight_service
        .recent_transactions(&params.user_id, limit)?;
    Ok(Json(records.into_iter().map(FeedItem::from).collect()))
}

/// GET /api/stats/category - Spending per category over a window
async fn get_category_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<Vec<CategoryStat>>, ApiError> {
    let days = bounded("days", params.days, 30, 1, 365)?;
    let stats = state
        .insight_service
        .category_stats(&params.user_id, days)?;
    Ok(Json(stats))
}

/// GET /api/user/{user_id}/transactions - Recent transactions for the app
async fn get_user_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<AppTransaction>>, ApiError> {
    let limit = bounded("limit", params.limit, 20, 1, 100)?;
    let records = state.insight_service.recent_transactions(&user_id, limit)?;
    Ok(Json(records.into_iter().map(AppTransaction::from).collect()))
}
