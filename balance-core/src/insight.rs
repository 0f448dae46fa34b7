//! Insight result types produced by the intelligence engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ranked match for a semantic query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Transaction ID
    pub id: String,
    /// Item description of the matched transaction
    pub item_text: String,
    /// Cosine similarity score (-1.0 - 1.0)
    pub similarity: f64,
}

/// Projected next purchase at a merchant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasePrediction {
    /// Merchant the prediction applies to
    pub merchant: String,
    /// Most recent item bought at the merchant
    pub item: String,
    /// Most recent category seen for the merchant
    pub category: Option<String>,
    /// Expected time of the next purchase
    pub predicted_time: DateTime<Utc>,
    /// Heuristic confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Number of purchases observed at the merchant (always >= 2)
    pub samples: usize,
    /// Mean gap between purchases, in seconds
    pub avg_interval_secs: f64,
}
