//! Qdrant REST client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{SecretString, VectorDatabaseSettings};
use crate::error::{ChattrError, Collaborator, Result};
use crate::provider::http::{shared_client, status_to_error};
use crate::provider::Embedder;

use super::{KnowledgeDocument, KnowledgeHit, KnowledgeIndex};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct QdrantIndex {
    base_url: String,
    collection: String,
    api_key: Option<SecretString>,
    embedder: Arc<dyn Embedder>,
}

impl QdrantIndex {
    pub fn new(settings: &VectorDatabaseSettings, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            base_url: settings.url.trim_end_matches('/').to_string(),
            collection: settings.name.clone(),
            api_key: settings.api_key.clone(),
            embedder,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/collections/{}{path}", self.base_url, self.collection);
        let mut builder = shared_client()
            .request(method, url)
            .timeout(REQUEST_TIMEOUT)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key.expose());
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let resp = builder
            .send()
            .await
            .map_err(|e| ChattrError::upstream(Collaborator::VectorDatabase, e))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(status_to_error(Collaborator::VectorDatabase, status, &body));
        }
        Ok(resp)
    }

    /// Create the collection if it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<()> {
        let resp = self
            .request(reqwest::Method::GET, "")
            .send()
            .await
            .map_err(|e| ChattrError::upstream(Collaborator::VectorDatabase, e))?;
        if resp.status().is_success() {
            return Ok(());
        }
        if resp.status() != reqwest::StatusCode::NOT_FOUND {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(status_to_error(Collaborator::VectorDatabase, status, &body));
        }

        info!(collection = %self.collection, dims = self.embedder.dimensions(), "creating vector collection");
        self.send(self.request(reqwest::Method::PUT, "").json(&serde_json::json!({
            "vectors": { "size": self.embedder.dimensions(), "distance": "Cosine" }
        })))
        .await?;
        Ok(())
    }
}

#[async_trait]
impl KnowledgeIndex for QdrantIndex {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeHit>> {
        if limit == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        let resp = self
            .send(
                self.request(reqwest::Method::POST, "/points/search")
                    .json(&serde_json::json!({
                        "vector": vector,
                        "limit": limit,
                        "with_payload": true,
                    })),
            )
            .await?;

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| ChattrError::upstream(Collaborator::VectorDatabase, e))?;
        let hits: Vec<KnowledgeHit> = body
            .result
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload?;
                Some(KnowledgeHit {
                    content: payload.content?,
                    score: point.score,
                    source: payload.source,
                })
            })
            .collect();
        debug!(collection = %self.collection, hits = hits.len(), "knowledge search");
        Ok(hits)
    }

    async fn upsert(&self, documents: &[KnowledgeDocument]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        let mut points = Vec::with_capacity(documents.len());
        for doc in documents {
            let vector = self.embedder.embed(&doc.content).await?;
            points.push(serde_json::json!({
                "id": uuid::Uuid::new_v4().to_string(),
                "vector": vector,
                "payload": { "content": doc.content, "source": doc.source },
            }));
        }

        self.send(
            self.request(reqwest::Method::PUT, "/points?wait=true")
                .json(&serde_json::json!({ "points": points })),
        )
        .await?;
        info!(collection = %self.collection, points = points.len(), "upserted knowledge");
        Ok(points.len())
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    payload: Option<PointPayload>,
}

#[derive(Deserialize)]
struct PointPayload {
    content: Option<String>,
    source: Option<String>,
}
