//! Events produced by one agent turn.

use serde::{Deserialize, Serialize};

use crate::types::ToolOutput;

/// One step of a turn, in the order the agent produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A piece of assistant text.
    ContentFragment { text: String },
    ToolStarted {
        name: String,
        arguments: serde_json::Value,
    },
    ToolCompleted { name: String, output: ToolOutput },
    /// Input was blocked. Always the only event of its turn.
    GuardrailRejected { reason: String },
}

impl AgentEvent {
    pub fn fragment(text: impl Into<String>) -> Self {
        Self::ContentFragment { text: text.into() }
    }

    pub fn tool_started(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self::ToolStarted {
            name: name.into(),
            arguments,
        }
    }

    pub fn tool_completed(name: impl Into<String>, output: ToolOutput) -> Self {
        Self::ToolCompleted {
            name: name.into(),
            output,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::GuardrailRejected {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(AgentEvent::fragment("Bonjour")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "content_fragment", "text": "Bonjour"}));

        let json = serde_json::to_value(AgentEvent::tool_completed(
            "tts",
            ToolOutput::audio("a.wav"),
        ))
        .unwrap();
        assert_eq!(json["type"], "tool_completed");
        assert_eq!(json["output"]["kind"], "audio");
    }
}
