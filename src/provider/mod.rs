//! Model provider trait and the OpenAI-compatible implementation.

pub mod embeddings;
pub mod http;
pub mod openai;

pub use embeddings::{Embedder, OpenAiEmbedder};
pub use openai::OpenAiProvider;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::ModelSettings;
use crate::error::Result;
use crate::types::{ModelMessage, TextStreamDelta};

/// A request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub messages: Vec<ModelMessage>,
    pub temperature: Option<f64>,
    pub tools: Vec<ToolDefinition>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Core trait implemented by chat model backends.
///
/// Implementations must be usable from many turns at once.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai").
    fn provider_name(&self) -> &str;

    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Stream a completion. Tool calls arrive as whole calls, never partial.
    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta>>>;
}

/// Build the configured chat provider.
pub fn create_provider(settings: &ModelSettings) -> Result<Arc<dyn ModelProvider>> {
    let api_key = settings.require_api_key()?.clone();
    Ok(Arc::new(OpenAiProvider::new(
        settings.name.clone(),
        api_key,
        settings.url.clone(),
        std::time::Duration::from_secs(settings.request_timeout_secs),
    )))
}

/// Build the configured embedder.
pub fn create_embedder(settings: &ModelSettings) -> Result<Arc<dyn Embedder>> {
    let api_key = settings.require_api_key()?.clone();
    Ok(Arc::new(
        OpenAiEmbedder::new(
            settings.embedding_name.clone(),
            api_key,
            settings.url.clone(),
            settings.embedding_dims,
        )
        .with_timeout(std::time::Duration::from_secs(settings.request_timeout_secs)),
    ))
}
