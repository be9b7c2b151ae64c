//! MCP schema types.

use serde::{Deserialize, Serialize};

/// Schema for a tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolSchema {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// Result of a successful MCP tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct McpToolCallResult {
    pub structured_content: Option<serde_json::Value>,
    pub text_content: Option<String>,
    pub content: Vec<serde_json::Value>,
}

impl McpToolCallResult {
    /// Structured content first, then plain text when every item is text,
    /// otherwise the raw content array (so media items survive).
    pub fn into_value(self) -> serde_json::Value {
        if let Some(structured) = self.structured_content {
            return structured;
        }
        let all_text = self
            .content
            .iter()
            .all(|item| item.get("type").and_then(|t| t.as_str()) == Some("text"));
        match self.text_content {
            Some(text) if all_text => serde_json::Value::String(text),
            _ => serde_json::Value::Array(self.content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_only_results_flatten_to_string() {
        let result = McpToolCallResult {
            structured_content: None,
            text_content: Some("assets/audio/a.wav".into()),
            content: vec![json!({"type": "text", "text": "assets/audio/a.wav"})],
        };
        assert_eq!(result.into_value(), json!("assets/audio/a.wav"));
    }

    #[test]
    fn mixed_results_keep_content_array() {
        let link = json!({"type": "resource_link", "uri": "file:///tmp/v.mp4", "name": "v.mp4"});
        let result = McpToolCallResult {
            structured_content: None,
            text_content: Some("rendered".into()),
            content: vec![json!({"type": "text", "text": "rendered"}), link.clone()],
        };
        assert_eq!(result.into_value()[1], link);
    }
}
