//! Transaction data structures
//!
//! `TransactionRecord` is the closed, validated shape every algorithm in the
//! workspace operates on. Loosely-shaped input (HTTP bodies, database rows)
//! is converted into it exactly once at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InsightError, InsightResult};

/// A single purchase made by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique transaction identifier
    pub id: String,
    /// Owner of the transaction
    pub user_id: String,
    /// Merchant name, used as the grouping key for purchase prediction
    pub merchant: String,
    /// Purchased item description (falls back to the merchant name)
    pub item_text: String,
    /// Product category, if one has been assigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Amount in cents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_cents: Option<i64>,
    /// When the purchase happened
    pub occurred_at: DateTime<Utc>,
    /// Precomputed item embedding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl TransactionRecord {
    /// Create a record with the merchant name doubling as item text
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        merchant: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let merchant = merchant.into();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            item_text: merchant.clone(),
            merchant,
            category: None,
            amount_cents: None,
            occurred_at,
            embedding: None,
        }
    }

    pub fn with_item_text(mut self, item_text: impl Into<String>) -> Self {
        self.item_text = item_text.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_amount_cents(mut self, amount_cents: i64) -> Self {
        self.amount_cents = Some(amount_cents);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Amount in currency units (cents / 100)
    pub fn amount(&self) -> Option<f64> {
        self.amount_cents.map(|cents| cents as f64 / 100.0)
    }
}

/// Incoming transaction payload, validated into a [`TransactionRecord`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub id: String,
    pub user_id: String,
    pub merchant: String,
    #[serde(default)]
    pub item_text: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

impl NewTransaction {
    /// Validate the payload and produce the closed record shape
    pub fn into_record(self) -> InsightResult<TransactionRecord> {
        let id = required("id", self.id)?;
        let user_id = required("user_id", self.user_id)?;
        let merchant = required("merchant", self.merchant)?;

        let item_text = self
            .item_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| merchant.clone());

        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(TransactionRecord {
            id,
            user_id,
            merchant,
            item_text,
            category,
            amount_cents: self.amount_cents,
            occurred_at: self.occurred_at,
            embedding: None,
        })
    }
}

/// A user's reply to a notification about one of their transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReply {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub reply: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl UserReply {
    /// Check the identifying fields are present
    pub fn validate(&self) -> InsightResult<()> {
        if self.id.trim().is_empty() {
            return Err(InsightError::invalid_record("reply id is empty"));
        }
        if self.user_id.trim().is_empty() {
            return Err(InsightError::invalid_record("reply user_id is empty"));
        }
        Ok(())
    }
}

/// One entry of a similarity candidate set
#[derive(Debug, Clone, PartialEq)]
pub struct RankCandidate {
    pub id: String,
    pub item_text: String,
    pub embedding: Vec<f32>,
}

impl RankCandidate {
    pub fn new(id: impl Into<String>, item_text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            item_text: item_text.into(),
            embedding,
        }
    }

    /// Build a candidate from a record, if it carries an embedding
    pub fn from_record(record: &TransactionRecord) -> Option<Self> {
        record.embedding.as_ref().map(|embedding| Self {
            id: record.id.clone(),
            item_text: record.item_text.clone(),
            embedding: embedding.clone(),
        })
    }
}

fn required(field: &str, value: String) -> InsightResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InsightError::invalid_record(format!("{} is empty", field)));
    }
    Ok(trimmed.to_string())
}
