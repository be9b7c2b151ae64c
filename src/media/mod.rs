//! Media results from tools: classification, reference extraction, local copies.

pub mod artifact;

pub use artifact::ArtifactStore;

use std::collections::HashSet;

use crate::config::McpSettings;
use crate::types::{MediaKind, ToolOutput};

/// Decides a tool's media kind from the configured tool-name lists.
#[derive(Debug, Clone, Default)]
pub struct MediaRouter {
    audio_tools: HashSet<String>,
    video_tools: HashSet<String>,
}

impl MediaRouter {
    pub fn new(
        audio_tools: impl IntoIterator<Item = String>,
        video_tools: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            audio_tools: audio_tools.into_iter().collect(),
            video_tools: video_tools.into_iter().collect(),
        }
    }

    pub fn from_settings(settings: &McpSettings) -> Self {
        Self::new(settings.audio_tools.clone(), settings.video_tools.clone())
    }

    /// Namespaced names (`<server>__<tool>`) match on the tool part.
    pub fn kind_of(&self, tool_name: &str) -> MediaKind {
        let base = tool_name
            .rsplit_once("__")
            .map_or(tool_name, |(_, tool)| tool);
        if self.audio_tools.contains(tool_name) || self.audio_tools.contains(base) {
            MediaKind::Audio
        } else if self.video_tools.contains(tool_name) || self.video_tools.contains(base) {
            MediaKind::Video
        } else {
            MediaKind::Other
        }
    }

    pub fn has_audio_tool<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        names.into_iter().any(|n| self.kind_of(n) == MediaKind::Audio)
    }

    pub fn has_video_tool<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        names.into_iter().any(|n| self.kind_of(n) == MediaKind::Video)
    }

    /// Classify a successful tool result. Media results without a usable
    /// reference degrade to `Other`.
    pub fn classify(&self, tool_name: &str, result: &serde_json::Value) -> ToolOutput {
        let detail = render_detail(result);
        match self.kind_of(tool_name) {
            MediaKind::Other => ToolOutput::other(detail),
            kind => match extract_reference(result) {
                Some(reference) => ToolOutput {
                    kind,
                    reference: Some(reference),
                    detail,
                    is_error: false,
                },
                None => ToolOutput::other(detail),
            },
        }
    }
}

/// Plain strings as-is, anything else as compact JSON.
pub fn render_detail(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

const REFERENCE_KEYS: &[&str] = &["path", "url", "uri", "value", "file"];

/// Find the first file reference in a tool result.
///
/// Accepts a plain string, an object with a `path`/`url`/`uri`/`value`/`file`
/// field, or an MCP content array (text, resource link, embedded resource).
pub fn extract_reference(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim().trim_matches('"');
            if trimmed.is_empty() {
                return None;
            }
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(trimmed) {
                    return extract_reference(&parsed);
                }
            }
            Some(trimmed.to_string())
        }
        serde_json::Value::Object(map) => {
            if let Some(text) = map.get("text").filter(|_| map.get("type").and_then(|t| t.as_str()) == Some("text")) {
                return extract_reference(text);
            }
            if let Some(resource) = map.get("resource") {
                if let Some(found) = extract_reference(resource) {
                    return Some(found);
                }
            }
            REFERENCE_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(extract_reference)
        }
        serde_json::Value::Array(items) => items.iter().find_map(extract_reference),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router() -> MediaRouter {
        MediaRouter::new(
            vec!["generate_audio_for_text".to_string()],
            vec!["generate_video_mcp".to_string()],
        )
    }

    #[test]
    fn kinds_follow_configured_names() {
        let r = router();
        assert_eq!(r.kind_of("generate_audio_for_text"), MediaKind::Audio);
        assert_eq!(r.kind_of("voice__generate_audio_for_text"), MediaKind::Audio);
        assert_eq!(r.kind_of("generate_video_mcp"), MediaKind::Video);
        assert_eq!(r.kind_of("search"), MediaKind::Other);
        assert!(r.has_audio_tool(["search", "generate_audio_for_text"]));
        assert!(!r.has_video_tool(["search"]));
    }

    #[test]
    fn references_come_from_strings_objects_and_content_arrays() {
        assert_eq!(extract_reference(&json!("/tmp/a.wav")).as_deref(), Some("/tmp/a.wav"));
        assert_eq!(extract_reference(&json!({"path": "/tmp/a.wav"})).as_deref(), Some("/tmp/a.wav"));
        assert_eq!(
            extract_reference(&json!("{\"url\": \"https://cdn/v.mp4\"}")).as_deref(),
            Some("https://cdn/v.mp4")
        );
        assert_eq!(
            extract_reference(&json!([
                {"type": "text", "text": "https://cdn/a.wav"},
                {"type": "text", "text": "ignored"}
            ]))
            .as_deref(),
            Some("https://cdn/a.wav")
        );
        assert_eq!(
            extract_reference(&json!([{"type": "resource_link", "uri": "file:///tmp/v.mp4", "name": "v"}])).as_deref(),
            Some("file:///tmp/v.mp4")
        );
        assert_eq!(extract_reference(&json!(42)), None);
        assert_eq!(extract_reference(&json!("  ")), None);
    }

    #[test]
    fn classify_sets_reference_only_for_media_tools() {
        let r = router();
        let audio = r.classify("generate_audio_for_text", &json!("/tmp/a.wav"));
        assert_eq!(audio.kind, MediaKind::Audio);
        assert_eq!(audio.reference.as_deref(), Some("/tmp/a.wav"));

        let other = r.classify("search", &json!({"hits": 3}));
        assert_eq!(other.kind, MediaKind::Other);
        assert_eq!(other.reference, None);
        assert_eq!(other.detail, "{\"hits\":3}");

        let empty = r.classify("generate_video_mcp", &json!(null));
        assert_eq!(empty.kind, MediaKind::Other);
    }
}
