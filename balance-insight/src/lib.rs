//! Transaction Intelligence engine
//!
//! Two independent, pure components over a user's transaction history:
//! - [`SimilarityRanker`] scores a bounded candidate set against a query
//!   embedding with cosine similarity and returns the top matches
//! - [`PurchaseIntervalPredictor`] estimates the typical gap between repeat
//!   purchases per merchant and projects the next purchase time
//!
//! Neither component performs I/O or keeps state between calls.

pub mod prediction;
pub mod similarity;

pub use prediction::PurchaseIntervalPredictor;
pub use similarity::{cosine_similarity, SimilarityRanker};
