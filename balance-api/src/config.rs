//! Server configuration from environment variables

use std::env;
use std::path::PathBuf;

use balance_core::InsightConfig;

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Port to listen on
    pub port: u16,
    /// Path to the SQLite transaction database
    pub db_path: PathBuf,
    /// Directory for records the database could not accept
    pub fallback_dir: PathBuf,
    /// OpenAI key; semantic search and auto-categorization need it
    pub openai_api_key: Option<String>,
    /// Embedding model override with its output dimension
    pub embedding_model: Option<(String, usize)>,
    /// Chat model override for categorization
    pub chat_model: Option<String>,
    /// Insight engine tunables
    pub insight: InsightConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            db_path: PathBuf::from("data/transactions.db"),
            fallback_dir: PathBuf::from("data/fallback"),
            openai_api_key: None,
            embedding_model: None,
            chat_model: None,
            insight: InsightConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables
    ///
    /// Reads:
    /// - SERVER_PORT (default 8000)
    /// - TRANSACTIONS_DB_PATH (default data/transactions.db)
    /// - FALLBACK_DIR (default data/fallback)
    /// - OPENAI_API_KEY (optional)
    /// - OPENAI_EMBEDDING_MODEL + OPENAI_EMBEDDING_DIMENSION (optional, both or neither)
    /// - OPENAI_CHAT_MODEL (optional)
    /// - INSIGHT_CONFIG: JSON object overriding engine tunables (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match lookup("SERVER_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                field: "SERVER_PORT".to_string(),
                value: raw,
            })?,
            None => defaults.port,
        };

        let embedding_model = match (
            lookup("OPENAI_EMBEDDING_MODEL"),
            lookup("OPENAI_EMBEDDING_DIMENSION"),
        ) {
            (Some(model), Some(raw)) => {
                let dimension = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "OPENAI_EMBEDDING_DIMENSION".to_string(),
                    value: raw,
                })?;
                Some((model, dimension))
            }
            (None, None) => None,
            _ => {
                return Err(ConfigError::Incomplete(
                    "OPENAI_EMBEDDING_MODEL and OPENAI_EMBEDDING_DIMENSION must be set together",
                ))
            }
        };

        let insight = match lookup("INSIGHT_CONFIG") {
            Some(json) => serde_json::from_str(&json).map_err(|e| ConfigError::InvalidJson {
                field: "INSIGHT_CONFIG".to_string(),
                error: e.to_string(),
            })?,
            None => defaults.insight,
        };

        Ok(Self {
            port,
            db_path: lookup("TRANSACTIONS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            fallback_dir: lookup("FALLBACK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.fallback_dir),
            openai_api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            embedding_model,
            chat_model: lookup("OPENAI_CHAT_MODEL"),
            insight,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue { field: String, value: String },

    #[error("Invalid JSON in {field}: {error}")]
    InvalidJson { field: String, error: String },

    #[error("Incomplete configuration: {0}")]
    Incomplete(&'static str),
}
