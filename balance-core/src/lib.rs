//! Core types for BalanceIQ
//!
//! This crate defines the shared data structures used across the workspace:
//! the validated transaction record, the insight result shapes, the tunable
//! engine configuration and the error taxonomy of the intelligence core.

pub mod config;
pub mod error;
pub mod insight;
pub mod persist;
pub mod transaction;

pub use config::{InsightConfig, PredictorConfig, RankerConfig};
pub use error::{InsightError, InsightResult};
pub use insight::{PurchasePrediction, SimilarityResult};
pub use persist::PersistOutcome;
pub use transaction::{NewTransaction, RankCandidate, TransactionRecord, UserReply};
