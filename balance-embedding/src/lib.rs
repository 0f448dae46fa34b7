//! Embeddings and Transaction Storage for BalanceIQ
//!
//! The external collaborators of the insight engine:
//! - Generate item and query embeddings with OpenAI's text-embedding-3-small model
//! - Store transactions, their embeddings and user replies in SQLite
//! - Serve bounded candidate sets and chronological histories to the engine

pub mod client;
pub mod error;
pub mod store;

pub use client::{EmbeddingClient, EmbeddingProvider, EmbeddingVector};
pub use error::{EmbeddingError, Result};
pub use store::{CategoryStat, StoreStats, TransactionStore};
