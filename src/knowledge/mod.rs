//! Semantic knowledge index for era and character background.

pub mod qdrant;

pub use qdrant::QdrantIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Longest chunk produced by [`chunk_text`], in characters.
pub const MAX_CHUNK_CHARS: usize = 1_000;

/// A retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeHit {
    pub content: String,
    pub score: f32,
    #[serde(default)]
    pub source: Option<String>,
}

/// A passage to index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// Collection-scoped similarity search and upsert.
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeHit>>;

    /// Index documents; returns how many were written.
    async fn upsert(&self, documents: &[KnowledgeDocument]) -> Result<usize>;
}

/// Render hits as a context block for the system prompt.
pub fn format_context(hits: &[KnowledgeHit]) -> Option<String> {
    if hits.is_empty() {
        return None;
    }
    let mut block = String::from("<references>\n");
    for (i, hit) in hits.iter().enumerate() {
        match &hit.source {
            Some(source) => block.push_str(&format!("[{}] ({source}) {}\n", i + 1, hit.content.trim())),
            None => block.push_str(&format!("[{}] {}\n", i + 1, hit.content.trim())),
        }
    }
    block.push_str("</references>");
    Some(block)
}

/// Split text into paragraph-aligned chunks of at most [`MAX_CHUNK_CHARS`].
///
/// A single paragraph longer than the limit is split on character boundaries.
pub fn chunk_text(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() && current.chars().count() + paragraph.chars().count() + 2 > MAX_CHUNK_CHARS {
            chunks.push(std::mem::take(&mut current));
        }
        if paragraph.chars().count() > MAX_CHUNK_CHARS {
            let chars: Vec<char> = paragraph.chars().collect();
            for piece in chars.chunks(MAX_CHUNK_CHARS) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
