//! OpenAI embedding client

use async_openai::{
    config::OpenAIConfig,
    types::embeddings::{CreateEmbeddingRequest, EmbeddingInput},
    Client,
};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::error::{EmbeddingError, Result};

/// Embedding vector (1536 dimensions for text-embedding-3-small)
pub type EmbeddingVector = Vec<f32>;

const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSION: usize = 1536;

/// Source of fixed-length embeddings for free text
///
/// Failures are returned to the caller as-is; implementations do not retry.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text`, which must not be blank
    async fn embed(&self, text: &str) -> Result<EmbeddingVector>;

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;
}

/// OpenAI embedding client
pub struct EmbeddingClient {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: usize,
}

impl EmbeddingClient {
    /// Create a new embedding client
    ///
    /// Uses text-embedding-3-small model (1536 dimensions)
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
        }
    }

    /// Use a different embedding model with its output dimension
    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    /// Text used to embed a purchased item
    ///
    /// Merchant and category give short item names enough context to land
    /// near related purchases.
    pub fn item_text(item_text: &str, merchant: &str, category: Option<&str>) -> String {
        let mut text = format!("Purchase: {}\nMerchant: {}", item_text, merchant);
        if let Some(category) = category {
            text.push_str(&format!("\nCategory: {}", category));
        }
        text
    }

    /// Get the embedding model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Low-level embedding generation
    async fn generate_embedding(&self, text: &str) -> Result<EmbeddingVector> {
        let request = CreateEmbeddingRequest {
            model: self.model.clone(),
            input: EmbeddingInput::String(text.to_string()),
            encoding_format: None,
            dimensions: None,
            user: None,
        };

        let response = self.client.embeddings().create(request).await?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| EmbeddingError::Config("No embeddings returned from API".to_string()))?;

        validate_dimension(self.dimension, &embedding)?;

        info!(
            "Generated embedding: dimension={}, model={}",
            embedding.len(),
            self.model
        );

        Ok(embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    #[instrument(skip(self, text), fields(len = text.len()))]
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        debug!("Embedding text with length: {} chars", text.len());
        self.generate_embedding(text).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn validate_dimension(expected: usize, embedding: &[f32]) -> Result<()> {
    if embedding.len() != expected {
        return Err(EmbeddingError::InvalidDimension {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}
