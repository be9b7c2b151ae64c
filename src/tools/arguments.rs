//! Typed access to tool call arguments.

use crate::error::{ChattrError, Result};

/// Wrapper around tool call arguments.
///
/// Models sometimes send arguments as a JSON-encoded string instead of an
/// object; [`ToolArguments::new`] normalizes that.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value: coerce(value),
        }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// The arguments as a JSON object map, if they are one.
    pub fn as_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.value.as_object()
    }

    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChattrError::Validation(format!("Missing string argument: {key}")))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            ChattrError::Validation(format!("Failed to deserialize arguments: {e}"))
        })
    }

    /// Compact single-line rendering for activity details and logs.
    pub fn summary(&self) -> String {
        self.value.to_string()
    }
}

fn coerce(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return serde_json::json!({});
            }
            match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(parsed @ serde_json::Value::Object(_)) => parsed,
                _ => serde_json::Value::String(raw),
            }
        }
        serde_json::Value::Null => serde_json::json!({}),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn encoded_object_strings_are_decoded() {
        let args = ToolArguments::new(serde_json::json!("{\"text\": \"Bonjour\"}"));
        assert_eq!(args.get_str("text").unwrap(), "Bonjour");
    }

    #[test]
    fn empty_and_null_become_empty_object() {
        assert_eq!(ToolArguments::new(serde_json::json!("  ")).raw(), &serde_json::json!({}));
        assert_eq!(ToolArguments::new(serde_json::Value::Null).raw(), &serde_json::json!({}));
    }

    #[test]
    fn non_object_strings_stay_strings() {
        let args = ToolArguments::new(serde_json::json!("plain words"));
        assert_eq!(args.raw(), &serde_json::json!("plain words"));
        assert!(args.as_object().is_none());
    }

    #[test]
    fn deserialize_into_struct() {
        #[derive(Deserialize)]
        struct Speak {
            text: String,
        }
        let args = ToolArguments::new(serde_json::json!({"text": "Vive"}));
        let speak: Speak = args.deserialize().unwrap();
        assert_eq!(speak.text, "Vive");

        let err = args.get_str("voice").unwrap_err();
        assert!(matches!(err, ChattrError::Validation(_)));
    }
}
