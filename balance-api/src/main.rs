//! BalanceIQ API Server
//!
//! HTTP API server exposing semantic transaction search, next-purchase
//! prediction and transaction ingestion.

mod config;
mod error;
mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use balance_embedding::{EmbeddingClient, EmbeddingProvider, TransactionStore};
use balance_services::{Categorizer, IngestService, InsightService, ProductCategorizer};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ApiConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TransactionStore>,
    pub insight_service: Arc<InsightService>,
    pub ingest_service: Arc<IngestService>,
}

/// Build the full router for `state`
pub fn build_router(state: AppState) -> Router {
    // Configure CORS for the mobile/web frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", routes::api_routes())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,balance_api=debug")),
        )
        .init();

    info!("Starting BalanceIQ API");

    let config = ApiConfig::from_env()?;

    info!("Initializing transaction store at: {:?}", config.db_path);
    let store = Arc::new(TransactionStore::new(&config.db_path)?);

    // OpenAI-backed collaborators are optional
    let (embedder, categorizer): (
        Option<Arc<dyn EmbeddingProvider>>,
        Option<Arc<dyn Categorizer>>,
    ) = match &config.openai_api_key {
        Some(api_key) => {
            let mut client = EmbeddingClient::new(api_key.clone());
            if let Some((model, dimension)) = &config.embedding_model {
                client = client.with_model(model.clone(), *dimension);
            }
            info!("Embedding client initialized with model {}", client.model());

            let mut categorizer = ProductCategorizer::new(api_key.clone());
            if let Some(model) = &config.chat_model {
                categorizer = categorizer.with_model(model);
            }

            (
                Some(Arc::new(client) as Arc<dyn EmbeddingProvider>),
                Some(Arc::new(categorizer) as Arc<dyn Categorizer>),
            )
        }
        None => {
            info!("OPENAI_API_KEY not set - semantic search and auto-categorization disabled");
            (None, None)
        }
    };

    let insight_service = Arc::new(InsightService::new(
        store.clone(),
        embedder.clone(),
        config.insight.clone(),
    ));

    let mut ingest_service = IngestService::new(store.clone(), config.fallback_dir.clone());
    if let Some(embedder) = embedder {
        ingest_service = ingest_service.with_embedder(embedder);
    }
    if let Some(categorizer) = categorizer {
        ingest_service = ingest_service.with_categorizer(categorizer);
    }
    info!("Fallback directory: {:?}", config.fallback_dir);

    let state = AppState {
        store,
        insight_service,
        ingest_service: Arc::new(ingest_service),
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
