//! Error types for chattr.

pub mod category;

pub use category::{Collaborator, ErrorCategory};

use thiserror::Error;

/// Text shown to the user when a guardrail blocks a turn.
pub const BLOCKED_MESSAGE: &str =
    "I'm sorry, but I can't help with that request. Please rephrase your message and try again.";

/// Text shown to the user when a turn fails for any non-guardrail reason.
pub const FAILURE_MESSAGE: &str =
    "Something went wrong while generating a response. Please try again in a moment.";

/// Text shown to the user when their message is rejected before processing.
pub const INVALID_INPUT_MESSAGE: &str = "Please enter a message before sending.";

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Primary error type for all chattr operations.
#[derive(Error, Debug)]
pub enum ChattrError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream error ({collaborator}): {message}")]
    Upstream {
        collaborator: Collaborator,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Guardrail '{guardrail}' rejected input: {reason}")]
    GuardrailRejection { guardrail: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Turn canceled")]
    Canceled,
}

impl ChattrError {
    /// Upstream failure with an underlying cause.
    pub fn upstream(
        collaborator: Collaborator,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Upstream {
            collaborator,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Upstream failure described only by a message (bad status, protocol violation).
    pub fn upstream_message(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self::Upstream {
            collaborator,
            message: message.into(),
            source: None,
        }
    }

    /// The failing collaborator, for upstream errors.
    pub fn collaborator(&self) -> Option<&Collaborator> {
        match self {
            Self::Upstream { collaborator, .. } => Some(collaborator),
            _ => None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Upstream { .. } | Self::Timeout(_) => ErrorCategory::Upstream,
            Self::GuardrailRejection { .. } => ErrorCategory::Guardrail,
            Self::Canceled => ErrorCategory::Canceled,
            Self::Io(_) | Self::Serialization(_) => ErrorCategory::Internal,
        }
    }

    /// Only configuration errors abort the process; everything else ends a single turn.
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    /// The fixed, user-safe text for this error. Never contains internal detail.
    pub fn user_message(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Guardrail => BLOCKED_MESSAGE,
            ErrorCategory::Validation => INVALID_INPUT_MESSAGE,
            _ => FAILURE_MESSAGE,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ChattrError>;
