use std::sync::Arc;

use crate::config::Config;
use crate::profile::vocabulary::SkillVocabulary;
use crate::similarity::SimilarityScorer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Loaded once at startup and shared read-only by every batch.
    pub vocabulary: Arc<SkillVocabulary>,
    /// Pluggable similarity backend, always behind the memoizing cache.
    /// Default: lexical. Embedding backend when EMBEDDING_API_URL is set.
    pub similarity: Arc<dyn SimilarityScorer>,
}
