//! API route definitions

mod health;
mod insights;
mod transactions;

use axum::Router;
use crate::AppState;

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(transactions::routes())
        .merge(insights::routes())
        .merge(health::routes())
}
