//! SQLite storage for transactions using rusqlite

use std::path::Path;
use std::sync::Mutex;

use balance_core::{TransactionRecord, UserReply};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{EmbeddingError, Result};

const UNCATEGORIZED: &str = "Uncategorized";

/// Columns decoded by `record_from_row`, in order
const RECORD_COLUMNS: &str = "id, user_id, merchant, COALESCE(item_text, merchant), category,
     amount_cents, occurred_at, item_embed";

/// SQLite store for transactions and user replies
pub struct TransactionStore {
    conn: Mutex<Connection>,
}

impl TransactionStore {
    /// Create a new transaction store
    ///
    /// # Arguments
    /// * `database_path` - Path to SQLite database file
    #[instrument(skip(database_path))]
    pub fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let path = database_path.as_ref();
        info!("Opening transaction database: {:?}", path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EmbeddingError::Io(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };

        store.init_tables()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };

        store.init_tables()?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| EmbeddingError::LockError)
    }

    /// Initialize database tables
    fn init_tables(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                merchant TEXT NOT NULL,
                item_text TEXT,
                category TEXT,
                amount_cents INTEGER,
                occurred_at INTEGER NOT NULL,
                item_embed BLOB,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_time
            ON transactions(user_id, occurred_at);

            CREATE TABLE IF NOT EXISTS user_replies (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                transaction_id TEXT,
                reply TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_user_replies_user
            ON user_replies(user_id);
            "#,
        )?;

        info!("Transaction database tables initialized");
        Ok(())
    }

    /// Insert a transaction or merge it into the existing row
    ///
    /// A missing category or embedding on the incoming record keeps the
    /// stored value.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub fn upsert_transaction(&self, record: &TransactionRecord) -> Result<()> {
        let embedding_bytes = record.embedding.as_deref().map(encode_embedding).transpose()?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO transactions
             (id, user_id, merchant, item_text, category, amount_cents, occurred_at, item_embed, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                merchant = excluded.merchant,
                item_text = excluded.item_text,
                category = COALESCE(excluded.category, transactions.category),
                amount_cents = excluded.amount_cents,
                occurred_at = excluded.occurred_at,
                item_embed = COALESCE(excluded.item_embed, transactions.item_embed),
                updated_at = excluded.updated_at",
            params![
                &record.id,
                &record.user_id,
                &record.merchant,
                &record.item_text,
                &record.category,
                record.amount_cents,
                record.occurred_at.timestamp_millis(),
                embedding_bytes,
                Utc::now().timestamp_millis(),
            ],
        )?;

        debug!("Saved transaction: {}", record.id);
        Ok(())
    }

    /// Attach an embedding to an existing transaction
    pub fn set_embedding(&self, id: &str, embedding: &[f32]) -> Result<()> {
        let bytes = encode_embedding(embedding)?;
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE transactions SET item_embed = ?1, updated_at = ?2 WHERE id = ?3",
            params![bytes, Utc::now().timestamp_millis(), id],
        )?;

        if updated == 0 {
            return Err(EmbeddingError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Set the category of an existing transaction
    pub fn set_category(&self, id: &str, category: &str) -> Result<()> {
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE transactions SET category = ?1, updated_at = ?2 WHERE id = ?3",
            params![category, Utc::now().timestamp_millis(), id],
        )?;

        if updated == 0 {
            return Err(EmbeddingError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Get a specific transaction
    #[instrument(skip(self))]
    pub fn get_transaction(&self, id: &str) -> Result<TransactionRecord> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM transactions WHERE id = ?1", RECORD_COLUMNS);

        conn.query_row(&sql, params![id], record_from_row)
            .optional()?
            .ok_or_else(|| EmbeddingError::NotFound(id.to_string()))
    }

    /// Most recent transactions for a user, newest first
    #[instrument(skip(self))]
    pub fn recent_transactions(&self, user_id: &str, limit: usize) -> Result<Vec<TransactionRecord>> {
        let sql = format!(
            "SELECT {} FROM transactions
             WHERE user_id = ?1
             ORDER BY occurred_at DESC
             LIMIT ?2",
            RECORD_COLUMNS
        );
        self.query_records(&sql, params![user_id, limit as i64])
    }

    /// Full purchase history for a user, oldest first
    #[instrument(skip(self))]
    pub fn history(&self, user_id: &str) -> Result<Vec<TransactionRecord>> {
        let sql = format!(
            "SELECT {} FROM transactions
             WHERE user_id = ?1
             ORDER BY occurred_at ASC",
            RECORD_COLUMNS
        );
        let records = self.query_records(&sql, params![user_id])?;
        debug!("Loaded {} history records for {}", records.len(), user_id);
        Ok(records)
    }

    /// Most recent embedded transactions for a user, newest first
    ///
    /// This is the candidate set for semantic search, bounded by `cap`.
    #[instrument(skip(self))]
    pub fn embedded_candidates(&self, user_id: &str, cap: usize) -> Result<Vec<TransactionRecord>> {
        let sql = format!(
            "SELECT {} FROM transactions
             WHERE user_id = ?1 AND item_embed IS NOT NULL
             ORDER BY occurred_at DESC
             LIMIT ?2",
            RECORD_COLUMNS
        );
        let records = self.query_records(&sql, params![user_id, cap as i64])?;
        debug!("Loaded {} embedded candidates for {}", records.len(), user_id);
        Ok(records)
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<TransactionRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, record_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Spending per category over the last `days` days ending at `now`
    ///
    /// Largest total first. Transactions without a category are grouped
    /// under "Uncategorized".
    #[instrument(skip(self))]
    pub fn category_stats(
        &self,
        user_id: &str,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<CategoryStat>> {
        let since = (now - Duration::days(days as i64)).timestamp_millis();
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT COALESCE(category, ?1) AS cat, COUNT(*), COALESCE(SUM(amount_cents), 0)
             FROM transactions
             WHERE user_id = ?2 AND occurred_at >= ?3
             GROUP BY cat
             ORDER BY 3 DESC, cat ASC",
        )?;

        let rows = stmt.query_map(params![UNCATEGORIZED, user_id, since], |row| {
            Ok(CategoryStat {
                category: row.get(0)?,
                txn_count: row.get::<_, i64>(1)? as usize,
                total_cents: row.get(2)?,
            })
        })?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(row?);
        }
        Ok(stats)
    }

    /// Save or update a user reply
    #[instrument(skip(self, reply), fields(id = %reply.id))]
    pub fn upsert_reply(&self, reply: &UserReply) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO user_replies (id, user_id, transaction_id, reply, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                transaction_id = excluded.transaction_id,
                reply = excluded.reply,
                created_at = excluded.created_at",
            params![
                &reply.id,
                &reply.user_id,
                &reply.transaction_id,
                &reply.reply,
                reply.created_at.timestamp_millis(),
            ],
        )?;

        debug!("Saved reply: {}", reply.id);
        Ok(())
    }

    /// Replies a user has sent, oldest first
    pub fn replies_for_user(&self, user_id: &str) -> Result<Vec<UserReply>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, transaction_id, reply, created_at
             FROM user_replies
             WHERE user_id = ?1
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok(UserReply {
                id: row.get(0)?,
                user_id: row.get(1)?,
                transaction_id: row.get(2)?,
                reply: row.get(3)?,
                created_at: timestamp_from_millis(row.get(4)?, 4)?,
            })
        })?;

        let mut replies = Vec::new();
        for row in rows {
            replies.push(row?);
        }
        Ok(replies)
    }

    /// Get statistics about stored data
    pub fn get_stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;

        let transaction_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

        let embedded_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE item_embed IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        let reply_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM user_replies", [], |row| row.get(0))?;

        // Get database size (page_count * page_size)
        let page_count: i64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap_or(0);
        let page_size: i64 = conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .unwrap_or(4096);

        Ok(StoreStats {
            transaction_count: transaction_count as usize,
            embedded_count: embedded_count as usize,
            reply_count: reply_count as usize,
            database_size_bytes: (page_count * page_size) as usize,
        })
    }
}

/// Statistics about stored data
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub transaction_count: usize,
    pub embedded_count: usize,
    pub reply_count: usize,
    pub database_size_bytes: usize,
}

/// Spending summary for one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStat {
    pub category: String,
    pub txn_count: usize,
    pub total_cents: i64,
}

fn encode_embedding(embedding: &[f32]) -> Result<Vec<u8>> {
    Ok(bincode::serde::encode_to_vec(
        embedding,
        bincode::config::standard(),
    )?)
}

fn decode_embedding(bytes: &[u8]) -> std::result::Result<Vec<f32>, bincode::error::DecodeError> {
    bincode::serde::decode_from_slice::<Vec<f32>, _>(bytes, bincode::config::standard())
        .map(|(embedding, _)| embedding)
}

fn timestamp_from_millis(millis: i64, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, millis))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    let embedding = row
        .get::<_, Option<Vec<u8>>>(7)?
        .map(|bytes| decode_embedding(&bytes))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Blob, Box::new(e)))?;

    Ok(TransactionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        merchant: row.get(2)?,
        item_text: row.get(3)?,
        category: row.get(4)?,
        amount_cents: row.get(5)?,
        occurred_at: timestamp_from_millis(row.get(6)?, 6)?,
        embedding,
    })
}
