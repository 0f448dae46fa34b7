//! Outcome of persisting an ingested record

use std::path::PathBuf;

use serde::Serialize;

/// Where an ingested record ended up.
///
/// A failed database write that was rescued by the fallback file is a
/// distinct, reportable outcome rather than a swallowed error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistOutcome {
    /// Written to the transaction store
    Persisted,
    /// Store write failed; the record was appended to a fallback file
    PersistFailedFallbackWritten { path: PathBuf, reason: String },
}

impl PersistOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistOutcome::Persisted)
    }
}
