//! Input guardrails, run before the model sees a message.
//!
//! A blocked turn never reaches the model. The detection reason goes to the
//! log; the user only sees the fixed blocked text.

pub mod injection;
pub mod pii;

pub use injection::PromptInjectionGuardrail;
pub use pii::PiiGuardrail;

use std::sync::Arc;

use tracing::warn;

use crate::error::{ChattrError, Result};
use crate::types::UserMessage;

/// Result of a single guardrail check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailVerdict {
    Allow,
    Block(String),
}

/// A synchronous check over the user's input.
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, input: &UserMessage) -> GuardrailVerdict;
}

/// Ordered guardrails; the first block wins.
#[derive(Clone, Default)]
pub struct GuardrailChain {
    guardrails: Vec<Arc<dyn Guardrail>>,
}

impl GuardrailChain {
    pub fn new(guardrails: Vec<Arc<dyn Guardrail>>) -> Self {
        Self { guardrails }
    }

    /// PII detection followed by prompt-injection detection.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(PiiGuardrail::new()),
            Arc::new(PromptInjectionGuardrail::new()),
        ])
    }

    pub fn len(&self) -> usize {
        self.guardrails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guardrails.is_empty()
    }

    /// Run every guardrail in order.
    pub fn check(&self, input: &UserMessage) -> Result<()> {
        for guardrail in &self.guardrails {
            if let GuardrailVerdict::Block(reason) = guardrail.check(input) {
                warn!(guardrail = guardrail.name(), reason = %reason, "input blocked by guardrail");
                return Err(ChattrError::GuardrailRejection {
                    guardrail: guardrail.name().to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for GuardrailChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.guardrails.iter().map(|g| g.name()))
            .finish()
    }
}
