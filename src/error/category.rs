//! Error classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad error category for routing turn termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Upstream,
    Guardrail,
    Canceled,
    Internal,
}

/// External collaborator that an upstream error is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Collaborator {
    Model,
    Embeddings,
    VectorDatabase,
    SessionStore,
    ToolService(String),
    ArtifactDownload,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => f.write_str("model"),
            Self::Embeddings => f.write_str("embeddings"),
            Self::VectorDatabase => f.write_str("vector-database"),
            Self::SessionStore => f.write_str("session-store"),
            Self::ToolService(name) => write!(f, "tool-service:{name}"),
            Self::ArtifactDownload => f.write_str("artifact-download"),
        }
    }
}
