//! Embedding-backed similarity via an OpenAI-compatible `/embeddings` endpoint.
//!
//! Vectors are cached per text for the life of the process; similarity is the cosine of the
//! two vectors clamped to [0, 1]. Retries on 429 and 5xx with exponential backoff.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;
use crate::similarity::{SimilarityError, SimilarityScorer};

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

pub struct EmbeddingSimilarity {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    vectors: Mutex<HashMap<String, Vec<f32>>>,
}

impl EmbeddingSimilarity {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, SimilarityError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            endpoint: format!("{}/embeddings", config.api_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            vectors: Mutex::new(HashMap::new()),
        })
    }

    fn cached(&self, text: &str) -> Option<Vec<f32>> {
        self.vectors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(text)
            .cloned()
    }

    /// Embeds `texts` in one request, retrying transient failures.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, SimilarityError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
        };

        let mut last_error: Option<SimilarityError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Embedding call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&self.endpoint).json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(SimilarityError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let message = response.text().await.unwrap_or_default();
                warn!("Embedding API returned {}: {}", status, message);
                last_error = Some(SimilarityError::Api {
                    status: status.as_u16(),
                    message,
                });
                continue;
            }

            if !status.is_success() {
                return Err(SimilarityError::Api {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }

            let parsed: EmbeddingResponse = response.json().await?;
            return order_vectors(parsed, texts.len());
        }

        Err(last_error.unwrap_or(SimilarityError::Exhausted {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl SimilarityScorer for EmbeddingSimilarity {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        let missing: Vec<&str> = [a, b]
            .into_iter()
            .filter(|t| self.cached(t).is_none())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        if !missing.is_empty() {
            let fetched = self.embed(&missing).await?;
            debug!(count = missing.len(), model = %self.model, "Fetched embeddings");
            let mut vectors = self.vectors.lock().unwrap_or_else(|e| e.into_inner());
            for (text, vector) in missing.iter().zip(fetched) {
                vectors.insert(text.to_string(), vector);
            }
        }

        match (self.cached(a), self.cached(b)) {
            (Some(va), Some(vb)) => Ok(cosine(&va, &vb)),
            _ => Err(SimilarityError::MalformedResponse(
                "embedding missing after fetch".to_string(),
            )),
        }
    }

    fn backend(&self) -> &'static str {
        "embedding"
    }
}

/// Puts response vectors back in request order and checks the count.
fn order_vectors(
    response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, SimilarityError> {
    if response.data.len() != expected {
        return Err(SimilarityError::MalformedResponse(format!(
            "expected {expected} embeddings, got {}",
            response.data.len()
        )));
    }
    let mut items = response.data;
    items.sort_by_key(|item| item.index);
    Ok(items.into_iter().map(|item| item.embedding).collect())
}

/// Cosine similarity clamped to [0, 1]; mismatched or zero vectors score 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(0.0, 1.0)
}
