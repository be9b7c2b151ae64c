//! Personally identifiable information detector.

use regex::Regex;

use super::{Guardrail, GuardrailVerdict};
use crate::types::UserMessage;

const PATTERNS: &[(&str, &str)] = &[
    (r"\b\d{3}-\d{2}-\d{4}\b", "social security number"),
    (r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b", "credit card number"),
    (
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        "email address",
    ),
    (r"\b\d{3}[\s.-]?\d{3}[\s.-]?\d{4}\b", "phone number"),
];

/// Blocks messages that contain SSNs, card numbers, emails or phone numbers.
pub struct PiiGuardrail {
    patterns: Vec<(Regex, &'static str)>,
}

impl PiiGuardrail {
    pub fn new() -> Self {
        let patterns = PATTERNS
            .iter()
            .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, *label)))
            .collect();
        Self { patterns }
    }
}

impl Default for PiiGuardrail {
    fn default() -> Self {
        Self::new()
    }
}

impl Guardrail for PiiGuardrail {
    fn name(&self) -> &str {
        "pii"
    }

    fn check(&self, input: &UserMessage) -> GuardrailVerdict {
        for (re, label) in &self.patterns {
            if re.is_match(&input.text) {
                return GuardrailVerdict::Block(format!("{label} detected"));
            }
        }
        GuardrailVerdict::Allow
    }
}
