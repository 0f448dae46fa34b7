//! Insight Service
//!
//! Fetches a user's data from the transaction store and hands it to the
//! insight engine. All I/O failures surface here, before the engine runs.

use std::sync::Arc;

use balance_core::{
    InsightConfig, PurchasePrediction, RankCandidate, SimilarityResult, TransactionRecord,
};
use balance_embedding::{CategoryStat, EmbeddingProvider, TransactionStore};
use balance_insight::{PurchaseIntervalPredictor, SimilarityRanker};
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::error::{ServiceError, ServiceResult};

/// Semantic search, purchase prediction and spending views for a user
pub struct InsightService {
    store: Arc<TransactionStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    ranker: SimilarityRanker,
    predictor: PurchaseIntervalPredictor,
}

impl InsightService {
    /// Create a new InsightService
    ///
    /// Without an embedder, semantic search reports `Unavailable`; the
    /// other views keep working.
    pub fn new(
        store: Arc<TransactionStore>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        config: InsightConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            ranker: SimilarityRanker::new(config.ranker),
            predictor: PurchaseIntervalPredictor::new(config.predictor),
        }
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Rank a user's recent transactions by similarity to free text
    #[instrument(skip(self))]
    pub async fn semantic_search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> ServiceResult<Vec<SimilarityResult>> {
        if query.trim().is_empty() {
            return Err(ServiceError::validation("query must not be empty"));
        }

        let embedder = self
            .embedder
            .as_ref()
            .ok_or(ServiceError::Unavailable("Embedding provider"))?;

        let query_vector = embedder.embed(query).await?;

        let records = self
            .store
            .embedded_candidates(user_id, self.ranker.config().candidate_cap)?;
        let candidates: Vec<RankCandidate> =
            records.iter().filter_map(RankCandidate::from_record).collect();

        debug!(
            "Semantic search for {}: {} candidates",
            user_id,
            candidates.len()
        );

        let results = self.ranker.rank(&query_vector, &candidates, limit)?;
        info!("Semantic search returned {} results", results.len());
        Ok(results)
    }

    /// Predict the next purchases for a user, soonest first
    #[instrument(skip(self))]
    pub fn predict_purchases(
        &self,
        user_id: &str,
        top_k: usize,
    ) -> ServiceResult<Vec<PurchasePrediction>> {
        let history = self.store.history(user_id)?;
        let predictions = self.predictor.predict(&history, top_k)?;
        info!(
            "Predicted {} purchases from {} transactions",
            predictions.len(),
            history.len()
        );
        Ok(predictions)
    }

    /// Most recent transactions for a user, newest first
    pub fn recent_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> ServiceResult<Vec<TransactionRecord>> {
        Ok(self.store.recent_transactions(user_id, limit)?)
    }

    /// Spending per category over the last `days` days
    pub fn category_stats(&self, user_id: &str, days: u32) -> ServiceResult<Vec<CategoryStat>> {
        Ok(self.store.category_stats(user_id, days, Utc::now())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use balance_core::InsightError;
    use balance_embedding::EmbeddingError;
    use chrono::{DateTime, TimeZone};

    /// Maps a few known words onto fixed 2-d directions
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> balance_embedding::Result<Vec<f32>> {
            if text.trim().is_empty() {
                return Err(EmbeddingError::EmptyInput);
            }
            Ok(if text.contains("coffee") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            })
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, day, 8, 0, 0).unwrap()
    }

    fn seeded_service(embedder: Option<Arc<dyn EmbeddingProvider>>) -> InsightService {
        let store = Arc::new(TransactionStore::new_in_memory().unwrap());
        let rows = vec![
            TransactionRecord::new("t1", "u1", "Blue Bottle", at(1))
                .with_item_text("Latte")
                .with_embedding(vec![0.9, 0.1]),
            TransactionRecord::new("t2", "u1", "Metro", at(2))
                .with_item_text("Train pass")
                .with_embedding(vec![0.0, 1.0]),
            TransactionRecord::new("t3", "u1", "Blue Bottle", at(3)).with_item_text("Beans"),
            TransactionRecord::new("t4", "u2", "Blue Bottle", at(3))
                .with_embedding(vec![1.0, 0.0]),
        ];
        for row in &rows {
            store.upsert_transaction(row).unwrap();
        }
        InsightService::new(store, embedder, InsightConfig::default())
    }

    #[tokio::test]
    async fn test_semantic_search_ranks_user_candidates() {
        let service = seeded_service(Some(Arc::new(KeywordEmbedder)));

        let results = service.semantic_search("coffee", "u1", 5).await.unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"], "Only u1's embedded rows are candidates");
        assert_eq!(results[0].item_text, "Latte");
    }

    #[tokio::test]
    async fn test_semantic_search_rejects_blank_query() {
        let service = seeded_service(Some(Arc::new(KeywordEmbedder)));
        let err = service.semantic_search("  ", "u1", 5).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_semantic_search_without_embedder() {
        let service = seeded_service(None);
        let err = service.semantic_search("coffee", "u1", 5).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_semantic_search_surfaces_dimension_mismatch() {
        let service = seeded_service(Some(Arc::new(KeywordEmbedder)));
        service
            .store
            .upsert_transaction(
                &TransactionRecord::new("t9", "u1", "Odd", at(9)).with_embedding(vec![1.0]),
            )
            .unwrap();

        let err = service.semantic_search("coffee", "u1", 5).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Insight(InsightError::DimensionMismatch { .. })
        ));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_predict_purchases_from_store() {
        let service = seeded_service(None);

        let predictions = service.predict_purchases("u1", 3).unwrap();

        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].merchant, "Blue Bottle");
        assert_eq!(predictions[0].item, "Beans");
        assert_eq!(predictions[0].predicted_time, at(5));
    }

    #[test]
    fn test_predict_purchases_unknown_user_is_empty() {
        let service = seeded_service(None);
        assert!(service.predict_purchases("nobody", 3).unwrap().is_empty());
    }
}
