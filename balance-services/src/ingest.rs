//! Ingest Service
//!
//! Validates incoming transactions, enriches them with a category and an
//! embedding, and persists them. A failed store write is rescued by
//! appending the record to a per-user JSON-lines fallback file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use balance_core::{NewTransaction, PersistOutcome, TransactionRecord, UserReply};
use balance_embedding::{EmbeddingClient, EmbeddingProvider, TransactionStore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::categorizer::{categorize_with_fallback, CategorySource, Categorizer};
use crate::error::{ServiceError, ServiceResult};

/// Write side of the transaction store
pub trait TransactionWriter: Send + Sync {
    fn write_transaction(&self, record: &TransactionRecord) -> balance_embedding::Result<()>;
    fn write_reply(&self, reply: &UserReply) -> balance_embedding::Result<()>;
}

impl TransactionWriter for TransactionStore {
    fn write_transaction(&self, record: &TransactionRecord) -> balance_embedding::Result<()> {
        self.upsert_transaction(record)
    }

    fn write_reply(&self, reply: &UserReply) -> balance_embedding::Result<()> {
        self.upsert_reply(reply)
    }
}

/// What happened to one ingested transaction
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub id: String,
    pub category: Option<String>,
    pub category_source: Option<CategorySource>,
    pub embedded: bool,
    pub outcome: PersistOutcome,
}

pub struct IngestService {
    writer: Arc<dyn TransactionWriter>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    categorizer: Option<Arc<dyn Categorizer>>,
    fallback_dir: PathBuf,
}

impl IngestService {
    pub fn new(writer: Arc<dyn TransactionWriter>, fallback_dir: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            embedder: None,
            categorizer: None,
            fallback_dir: fallback_dir.into(),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_categorizer(mut self, categorizer: Arc<dyn Categorizer>) -> Self {
        self.categorizer = Some(categorizer);
        self
    }

    /// Validate, enrich and persist one transaction
    ///
    /// Enrichment failures never block ingestion: a failed embedding leaves
    /// the record unembedded, a failed categorization uses the fallback label.
    #[instrument(skip(self, txn), fields(id = %txn.id))]
    pub async fn ingest(&self, txn: NewTransaction) -> ServiceResult<IngestReport> {
        let mut record = txn.into_record()?;

        let category_source = if record.category.is_some() {
            Some(CategorySource::Provided)
        } else if let Some(categorizer) = &self.categorizer {
            let categorization =
                categorize_with_fallback(categorizer.as_ref(), &record.item_text, &record.merchant)
                    .await;
            record.category = Some(categorization.category);
            Some(categorization.source)
        } else {
            None
        };

        if let Some(embedder) = &self.embedder {
            let text = EmbeddingClient::item_text(
                &record.item_text,
                &record.merchant,
                record.category.as_deref(),
            );
            match embedder.embed(&text).await {
                Ok(embedding) => record.embedding = Some(embedding),
                Err(e) => warn!("Storing {} without embedding: {}", record.id, e),
            }
        }

        let outcome = self.persist(&record)?;

        Ok(IngestReport {
            id: record.id,
            category: record.category,
            category_source,
            embedded: record.embedding.is_some(),
            outcome,
        })
    }

    /// Validate and store a user reply
    pub fn record_reply(&self, reply: &UserReply) -> ServiceResult<()> {
        reply.validate()?;
        self.writer.write_reply(reply)?;
        Ok(())
    }

    fn persist(&self, record: &TransactionRecord) -> ServiceResult<PersistOutcome> {
        let store_error = match self.writer.write_transaction(record) {
            Ok(()) => {
                info!("Persisted transaction {}", record.id);
                return Ok(PersistOutcome::Persisted);
            }
            Err(e) => e.to_string(),
        };

        warn!(
            "Store write failed for {}: {}. Writing fallback file",
            record.id, store_error
        );

        match append_fallback(&self.fallback_dir, record) {
            Ok(path) => Ok(PersistOutcome::PersistFailedFallbackWritten {
                path,
                reason: store_error,
            }),
            Err(source) => Err(ServiceError::FallbackWrite {
                store_error,
                source,
            }),
        }
    }
}

/// Append `record` as one JSON line to the user's fallback file in `dir`
fn append_fallback(dir: &Path, record: &TransactionRecord) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(fallback_file_name(&record.user_id));

    let line = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(file, "{}", line)?;

    Ok(path)
}

/// `<sanitized id>-<first 8 hex chars of sha256(id)>.jsonl`
///
/// The hash keeps ids that sanitize alike in separate files.
fn fallback_file_name(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    format!(
        "{}-{}.jsonl",
        sanitize_file_stem(user_id),
        hex::encode(&digest[..4])
    )
}

fn sanitize_file_stem(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use balance_embedding::EmbeddingError;
    use chrono::{TimeZone, Utc};

    struct FailingWriter;

    impl TransactionWriter for FailingWriter {
        fn write_transaction(&self, _record: &TransactionRecord) -> balance_embedding::Result<()> {
            Err(EmbeddingError::LockError)
        }

        fn write_reply(&self, _reply: &UserReply) -> balance_embedding::Result<()> {
            Err(EmbeddingError::LockError)
        }
    }

    struct ConstantEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ConstantEmbedder {
        async fn embed(&self, _text: &str) -> balance_embedding::Result<Vec<f32>> {
            Ok(vec![0.25, 0.75])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingProvider for DownEmbedder {
        async fn embed(&self, _text: &str) -> balance_embedding::Result<Vec<f32>> {
            Err(EmbeddingError::Config("provider down".to_string()))
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct AlwaysCoffee;

    #[async_trait]
    impl Categorizer for AlwaysCoffee {
        async fn categorize(&self, _item_text: &str, _merchant: &str) -> ServiceResult<String> {
            Ok("coffee".to_string())
        }
    }

    fn payload(id: &str, category: Option<&str>) -> NewTransaction {
        NewTransaction {
            id: id.to_string(),
            user_id: "user/1".to_string(),
            merchant: "Blue Bottle".to_string(),
            item_text: Some("Latte".to_string()),
            category: category.map(str::to_string),
            amount_cents: Some(550),
            occurred_at: Utc.with_ymd_and_hms(2025, 4, 2, 8, 15, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_ingest_enriches_and_persists() {
        let store = Arc::new(TransactionStore::new_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let service = IngestService::new(store.clone(), dir.path())
            .with_embedder(Arc::new(ConstantEmbedder))
            .with_categorizer(Arc::new(AlwaysCoffee));

        let report = service.ingest(payload("t1", None)).await.unwrap();

        assert_eq!(report.outcome, PersistOutcome::Persisted);
        assert_eq!(report.category.as_deref(), Some("Coffee"));
        assert_eq!(report.category_source, Some(CategorySource::Llm));
        assert!(report.embedded);

        let stored = store.get_transaction("t1").unwrap();
        assert_eq!(stored.category.as_deref(), Some("Coffee"));
        assert_eq!(stored.embedding, Some(vec![0.25, 0.75]));
    }

    #[tokio::test]
    async fn test_ingest_keeps_provided_category() {
        let store = Arc::new(TransactionStore::new_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let service = IngestService::new(store, dir.path()).with_categorizer(Arc::new(AlwaysCoffee));

        let report = service.ingest(payload("t1", Some("Dining"))).await.unwrap();

        assert_eq!(report.category.as_deref(), Some("Dining"));
        assert_eq!(report.category_source, Some(CategorySource::Provided));
        assert!(!report.embedded);
    }

    #[tokio::test]
    async fn test_ingest_survives_embedding_failure() {
        let store = Arc::new(TransactionStore::new_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let service = IngestService::new(store, dir.path()).with_embedder(Arc::new(DownEmbedder));

        let report = service.ingest(payload("t1", None)).await.unwrap();

        assert!(!report.embedded);
        assert!(report.outcome.is_persisted());
        assert_eq!(report.category_source, None);
    }

    #[tokio::test]
    async fn test_ingest_writes_fallback_when_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let service = IngestService::new(Arc::new(FailingWriter), dir.path());

        service.ingest(payload("t1", None)).await.unwrap();
        let report = service.ingest(payload("t2", None)).await.unwrap();

        let expected_path = dir.path().join(fallback_file_name("user/1"));
        match &report.outcome {
            PersistOutcome::PersistFailedFallbackWritten { path, reason } => {
                assert_eq!(path, &expected_path);
                assert!(reason.contains("lock"));
            }
            other => panic!("Expected fallback outcome, got {:?}", other),
        }

        let contents = std::fs::read_to_string(&expected_path).unwrap();
        let lines: Vec<TransactionRecord> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].id, "t2");
    }

    #[tokio::test]
    async fn test_ingest_rejects_invalid_payload() {
        let dir = tempfile::tempdir().unwrap();
        let service = IngestService::new(Arc::new(FailingWriter), dir.path());

        let mut bad = payload("t1", None);
        bad.id = " ".to_string();

        let err = service.ingest(bad).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(!dir.path().join(fallback_file_name("user/1")).exists());
    }

    #[test]
    fn test_record_reply_propagates_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = IngestService::new(Arc::new(FailingWriter), dir.path());
        let reply = UserReply {
            id: "r1".to_string(),
            user_id: "u1".to_string(),
            transaction_id: None,
            reply: "ok".to_string(),
            created_at: Utc::now(),
        };

        assert!(matches!(
            service.record_reply(&reply),
            Err(ServiceError::Embedding(EmbeddingError::LockError))
        ));
    }

    #[test]
    fn test_fallback_file_name_keeps_users_apart() {
        let slash = fallback_file_name("user/1");
        let underscore = fallback_file_name("user_1");

        assert_ne!(slash, underscore);
        assert!(slash.starts_with("user_1-"));
        assert!(slash.ends_with(".jsonl"));
        assert_eq!(slash, fallback_file_name("user/1"));
    }

    #[tokio::test]
    async fn test_fallback_files_do_not_mix_users() {
        let dir = tempfile::tempdir().unwrap();
        let service = IngestService::new(Arc::new(FailingWriter), dir.path());

        let mut other = payload("t2", None);
        other.user_id = "user_1".to_string();

        let first = service.ingest(payload("t1", None)).await.unwrap();
        let second = service.ingest(other).await.unwrap();

        let path_of = |report: &IngestReport| match &report.outcome {
            PersistOutcome::PersistFailedFallbackWritten { path, .. } => path.clone(),
            other => panic!("Expected fallback outcome, got {:?}", other),
        };
        let (a, b) = (path_of(&first), path_of(&second));
        assert_ne!(a, b);
        assert_eq!(std::fs::read_to_string(&a).unwrap().lines().count(), 1);
        assert_eq!(std::fs::read_to_string(&b).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("user/1"), "user_1");
        assert_eq!(sanitize_file_stem("../etc"), "___etc");
        assert_eq!(sanitize_file_stem("abc-DEF_9"), "abc-DEF_9");
    }
}
