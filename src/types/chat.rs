//! Chat-level types: what the user sends and what the assistant shows.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A user submission: text plus optional file attachments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMessage {
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

impl UserMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }
}

/// Lifecycle of one tool invocation, as shown to the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolStatus {
    Started,
    Completed,
}

/// One tool invocation inside a turn. Display only; never drives control flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolActivity {
    pub name: String,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub is_error: bool,
}

/// The assistant's reply. Grows while a turn streams.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssistantMessage {
    pub text: String,
    #[serde(default)]
    pub audio_ref: Option<String>,
    #[serde(default)]
    pub video_ref: Option<String>,
    #[serde(default)]
    pub activities: Vec<ToolActivity>,
}

impl AssistantMessage {
    /// A message carrying only fixed text (blocked or failed turns).
    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// One completed exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub input: UserMessage,
    pub output: AssistantMessage,
}

/// Declared media kind of a tool's result.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    #[default]
    Other,
}

/// A tool result after classification.
///
/// `reference` is a local path or URL for media results; `detail` is the
/// rendered result text kept on the activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolOutput {
    pub kind: MediaKind,
    #[serde(default)]
    pub reference: Option<String>,
    pub detail: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn other(detail: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Other,
            reference: None,
            detail: detail.into(),
            is_error: false,
        }
    }

    pub fn audio(reference: impl Into<String>) -> Self {
        Self::media(MediaKind::Audio, reference)
    }

    pub fn video(reference: impl Into<String>) -> Self {
        Self::media(MediaKind::Video, reference)
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Other,
            reference: None,
            detail: detail.into(),
            is_error: true,
        }
    }

    fn media(kind: MediaKind, reference: impl Into<String>) -> Self {
        let reference = reference.into();
        Self {
            kind,
            detail: reference.clone(),
            reference: Some(reference),
            is_error: false,
        }
    }
}
