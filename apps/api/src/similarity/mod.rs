//! Skill similarity: decides whether a candidate skill is "related enough" to a requested one
//! when their canonical IDs differ.
//!
//! Default: `LexicalSimilarity` (pure-Rust, deterministic, no network).
//! Optional: `EmbeddingSimilarity` (OpenAI-style embeddings endpoint, enabled via config).
//!
//! `AppState` holds an `Arc<dyn SimilarityScorer>`, always wrapped in `CachedSimilarity`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

pub mod embedding;

#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("embedding API unavailable after {retries} retries")]
    Exhausted { retries: u32 },
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Similarity between two skill names, in [0, 1]. Implementations must be symmetric.
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError>;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// LexicalSimilarity: default backend
// ────────────────────────────────────────────────────────────────────────────

/// Larger of the normalized edit-distance ratio and the token Jaccard overlap of the
/// lowercased names. "Amazon Web Services" vs "Amazon S3" scores low; "ReactJS" vs
/// "React JS" scores high.
pub struct LexicalSimilarity;

#[async_trait]
impl SimilarityScorer for LexicalSimilarity {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        Ok(lexical_similarity(a, b))
    }

    fn backend(&self) -> &'static str {
        "lexical"
    }
}

pub fn lexical_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let ratio = rapidfuzz::fuzz::ratio(a.chars(), b.chars());
    ratio.max(token_jaccard(&a, &b)).clamp(0.0, 1.0)
}

fn token_jaccard(a: &str, b: &str) -> f64 {
    let split = |s: &str| -> BTreeSet<String> {
        s.split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    };
    let ta = split(a);
    let tb = split(b);
    let union = ta.union(&tb).count();
    if union == 0 {
        return 0.0;
    }
    ta.intersection(&tb).count() as f64 / union as f64
}

// ────────────────────────────────────────────────────────────────────────────
// CachedSimilarity: memoizing wrapper
// ────────────────────────────────────────────────────────────────────────────

/// Memoizes successful lookups keyed by the unordered pair, so a batch asks the backend
/// at most once per pair and repeated runs see identical values.
pub struct CachedSimilarity<S> {
    inner: S,
    cache: Mutex<HashMap<(String, String), f64>>,
}

impl<S: SimilarityScorer> CachedSimilarity<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn key(a: &str, b: &str) -> (String, String) {
        let (a, b) = (a.to_lowercase(), b.to_lowercase());
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    #[cfg(test)]
    fn cached_pairs(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl<S: SimilarityScorer> SimilarityScorer for CachedSimilarity<S> {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        let key = Self::key(a, b);
        let hit = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .copied();
        if let Some(hit) = hit {
            return Ok(hit);
        }

        // Lock is not held across the await; a racing duplicate lookup is harmless.
        let value = self.inner.similarity(&key.0, &key.1).await?;
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, value);
        Ok(value)
    }

    fn backend(&self) -> &'static str {
        self.inner.backend()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that always fails, for degradation tests.
    pub(crate) struct FailingSimilarity;

    #[async_trait]
    impl SimilarityScorer for FailingSimilarity {
        async fn similarity(&self, _a: &str, _b: &str) -> Result<f64, SimilarityError> {
            Err(SimilarityError::Exhausted { retries: 3 })
        }

        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    struct CountingSimilarity(AtomicUsize);

    #[async_trait]
    impl SimilarityScorer for CountingSimilarity {
        async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(lexical_similarity(a, b))
        }

        fn backend(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn test_lexical_identical_and_disjoint() {
        assert_eq!(lexical_similarity("Docker", "docker"), 1.0);
        assert!(lexical_similarity("Docker", "Excel") < 0.5);
        assert_eq!(lexical_similarity("", "Excel"), 0.0);
    }

    #[test]
    fn test_lexical_is_symmetric() {
        let ab = lexical_similarity("Spring Boot", "Spring");
        let ba = lexical_similarity("Spring", "Spring Boot");
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_lexical_close_spellings_score_high() {
        assert!(lexical_similarity("ReactJS", "React JS") >= 0.8);
        assert!(lexical_similarity("SQL", "PostgreSQL") < 0.8);
    }

    #[tokio::test]
    async fn test_cache_calls_backend_once_per_pair() {
        let cached = CachedSimilarity::new(CountingSimilarity(AtomicUsize::new(0)));
        let first = cached.similarity("Vue", "Vue.js").await.unwrap();
        let second = cached.similarity("vue.js", "VUE").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner.0.load(Ordering::SeqCst), 1);
        assert_eq!(cached.cached_pairs(), 1);
    }

    #[tokio::test]
    async fn test_cache_does_not_store_failures() {
        let cached = CachedSimilarity::new(FailingSimilarity);
        assert!(cached.similarity("a", "b").await.is_err());
        assert_eq!(cached.cached_pairs(), 0);
    }
}
