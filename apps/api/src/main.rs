mod config;
mod errors;
mod extraction;
mod models;
mod profile;
mod routes;
mod screening;
mod similarity;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::profile::vocabulary::SkillVocabulary;
use crate::routes::build_router;
use crate::similarity::embedding::EmbeddingSimilarity;
use crate::similarity::{CachedSimilarity, LexicalSimilarity, SimilarityScorer};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on invalid screening defaults)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    // Load the skill vocabulary once; every batch shares it read-only
    let vocabulary = match &config.skill_vocabulary_path {
        Some(path) => SkillVocabulary::load(path)
            .with_context(|| format!("Failed to load skill vocabulary from {}", path.display()))?,
        None => SkillVocabulary::builtin(),
    };
    info!("Skill vocabulary loaded ({} skills)", vocabulary.len());

    // Initialize similarity backend (lexical by default, embeddings when configured)
    let similarity: Arc<dyn SimilarityScorer> = match &config.embedding {
        Some(embedding) => {
            let backend = EmbeddingSimilarity::new(embedding)
                .context("Failed to build embedding client")?;
            info!("Similarity backend: embedding (model: {})", embedding.model);
            Arc::new(CachedSimilarity::new(backend))
        }
        None => {
            info!("Similarity backend: lexical");
            Arc::new(CachedSimilarity::new(LexicalSimilarity))
        }
    };

    info!(
        "Screening defaults: weights {}/{}/{}, concurrency {}, timeout {}s",
        config.screening.factor_weights.skills,
        config.screening.factor_weights.experience,
        config.screening.factor_weights.education,
        config.screening.max_concurrency,
        config.screening.per_document_timeout_seconds
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        vocabulary: Arc::new(vocabulary),
        similarity,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict allowed origins once a frontend origin is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
