//! Product categorization
//!
//! Asks an OpenAI chat model to pick one label from a fixed category list.
//! Anything other than a clean label from the list falls back to "Other".

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::{ServiceError, ServiceResult};

/// Labels a transaction may be assigned
pub const CATEGORIES: &[&str] = &[
    "Groceries",
    "Dining",
    "Coffee",
    "Transport",
    "Shopping",
    "Entertainment",
    "Utilities",
    "Health",
    "Travel",
    "Subscriptions",
    "Other",
];

/// Label used whenever categorization fails
pub const FALLBACK_CATEGORY: &str = "Other";

/// Assigns a raw category label to a purchased item
#[async_trait]
pub trait Categorizer: Send + Sync {
    async fn categorize(&self, item_text: &str, merchant: &str) -> ServiceResult<String>;
}

/// Where a stored category came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategorySource {
    /// Supplied with the transaction
    Provided,
    /// Chosen by the categorizer
    Llm,
    /// Categorizer failed or answered outside the list
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Categorization {
    pub category: String,
    pub source: CategorySource,
}

impl Categorization {
    fn fallback() -> Self {
        Self {
            category: FALLBACK_CATEGORY.to_string(),
            source: CategorySource::Fallback,
        }
    }
}

/// Categorize an item, never failing
pub async fn categorize_with_fallback(
    categorizer: &dyn Categorizer,
    item_text: &str,
    merchant: &str,
) -> Categorization {
    match categorizer.categorize(item_text, merchant).await {
        Ok(raw) => match normalize_label(&raw) {
            Some(category) => Categorization {
                category: category.to_string(),
                source: CategorySource::Llm,
            },
            None => {
                warn!("Categorizer returned unknown label {:?}, using fallback", raw);
                Categorization::fallback()
            }
        },
        Err(e) => {
            warn!("Categorization failed for {:?}: {}", item_text, e);
            Categorization::fallback()
        }
    }
}

/// Match a model answer against the category list, ignoring case,
/// surrounding quotes and trailing punctuation
fn normalize_label(raw: &str) -> Option<&'static str> {
    let cleaned = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
        .trim();

    CATEGORIES
        .iter()
        .copied()
        .find(|category| category.eq_ignore_ascii_case(cleaned))
}

/// OpenAI chat-based categorizer
#[derive(Debug, Clone)]
pub struct ProductCategorizer {
    client: Client<OpenAIConfig>,
    model: String,
}

impl ProductCategorizer {
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: "gpt-4o-mini".to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    fn system_prompt() -> String {
        format!(
            "You categorize consumer purchases. Reply with exactly one of these labels and nothing else: {}.",
            CATEGORIES.join(", ")
        )
    }
}

#[async_trait]
impl Categorizer for ProductCategorizer {
    #[instrument(skip(self))]
    async fn categorize(&self, item_text: &str, merchant: &str) -> ServiceResult<String> {
        let user_prompt = format!("Item: {}\nMerchant: {}", item_text, merchant);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(Self::system_prompt())
                    .build()
                    .map_err(|e| ServiceError::Categorization(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt)
                    .build()
                    .map_err(|e| ServiceError::Categorization(e.to_string()))?
                    .into(),
            ])
            .temperature(0.0)
            .build()
            .map_err(|e| ServiceError::Categorization(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ServiceError::Categorization(format!("OpenAI API error: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| ServiceError::Categorization("No response from OpenAI".to_string()))?;

        debug!("Categorizer answered {:?}", content);
        Ok(content.clone())
    }
}
