//! Text embeddings for knowledge retrieval.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SecretString;
use crate::error::{ChattrError, Collaborator, Result};

use super::http::{bearer_headers, shared_client, status_to_error};

/// Turns text into a dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Output dimensionality.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `POST {base}/embeddings` on an OpenAI-compatible endpoint.
pub struct OpenAiEmbedder {
    model: String,
    api_key: SecretString,
    base_url: String,
    dimensions: usize,
    timeout: Duration,
}

impl OpenAiEmbedder {
    pub fn new(
        model: impl Into<String>,
        api_key: SecretString,
        base_url: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            model: model.into(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            dimensions,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        debug!(model = %self.model, chars = text.len(), "embedding text");

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(self.api_key.expose()))
            .timeout(self.timeout)
            .json(&serde_json::json!({
                "model": self.model,
                "input": text,
                "dimensions": self.dimensions,
            }))
            .send()
            .await
            .map_err(|e| ChattrError::upstream(Collaborator::Embeddings, e))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_to_error(Collaborator::Embeddings, status, &body));
        }

        let data: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| ChattrError::upstream(Collaborator::Embeddings, e))?;
        let vector = data
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                ChattrError::upstream_message(Collaborator::Embeddings, "empty embedding response")
            })?;

        if vector.len() != self.dimensions {
            return Err(ChattrError::upstream_message(
                Collaborator::Embeddings,
                format!(
                    "expected {} dimensions, got {}",
                    self.dimensions,
                    vector.len()
                ),
            ));
        }
        Ok(vector)
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
