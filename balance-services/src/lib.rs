//! Business logic services for BalanceIQ
//!
//! This crate wires the external collaborators (embedding provider,
//! transaction store, LLM categorizer) around the pure insight engine.

pub mod categorizer;
pub mod error;
pub mod ingest;
pub mod insight_service;

pub use categorizer::{
    categorize_with_fallback, Categorization, CategorySource, Categorizer, ProductCategorizer,
    CATEGORIES, FALLBACK_CATEGORY,
};
pub use error::{ServiceError, ServiceResult};
pub use ingest::{IngestReport, IngestService, TransactionWriter};
pub use insight_service::InsightService;
