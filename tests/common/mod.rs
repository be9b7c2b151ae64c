//! Shared test helpers: a scripted model and scripted tools.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;

use chattr::error::{ChattrError, Collaborator, Result};
use chattr::provider::{ModelProvider, ProviderRequest};
use chattr::tools::{ToolArguments, ToolHandle, ToolParameters};
use chattr::types::*;

/// A provider that replays one scripted response per call and records requests.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Vec<TextStreamDelta>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain text answer, streamed in the given pieces.
    pub fn then_text(self, pieces: &[&str]) -> Self {
        let mut deltas: Vec<TextStreamDelta> =
            pieces.iter().map(|p| TextStreamDelta::text(*p)).collect();
        deltas.push(TextStreamDelta::done(Some(FinishReason::Stop), None));
        self.responses.lock().unwrap().push_back(deltas);
        self
    }

    /// Queue an answer that calls tools, optionally after some text.
    pub fn then_tools(self, text: &str, calls: Vec<(&str, &str, serde_json::Value)>) -> Self {
        let mut deltas = Vec::new();
        if !text.is_empty() {
            deltas.push(TextStreamDelta::text(text));
        }
        deltas.push(TextStreamDelta::tool_calls(
            calls
                .into_iter()
                .map(|(id, name, arguments)| AgentToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments,
                })
                .collect(),
        ));
        deltas.push(TextStreamDelta::done(Some(FinishReason::ToolCalls), None));
        self.responses.lock().unwrap().push_back(deltas);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta>>> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(deltas) => Ok(Box::pin(futures::stream::iter(deltas.into_iter().map(Ok)))),
            None => Err(ChattrError::upstream_message(
                Collaborator::Model,
                "no scripted response left",
            )),
        }
    }
}

/// A tool that returns a fixed result (or error) and records its arguments.
pub struct ScriptedTool {
    name: String,
    parameters: ToolParameters,
    result: std::result::Result<serde_json::Value, String>,
    calls: Mutex<Vec<serde_json::Value>>,
}

impl ScriptedTool {
    pub fn ok(name: &str, result: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            parameters: ToolParameters::object().string("text", "Text to use", true).build(),
            result: Ok(result),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &str, message: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            parameters: ToolParameters::empty(),
            result: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<serde_json::Value> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolHandle for ScriptedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "scripted tool"
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn invoke(&self, args: &ToolArguments) -> Result<serde_json::Value> {
        self.calls.lock().unwrap().push(args.raw().clone());
        match &self.result {
            Ok(value) => Ok(value.clone()),
            Err(message) => Err(ChattrError::upstream_message(
                Collaborator::ToolService(self.name.clone()),
                message.clone(),
            )),
        }
    }
}

/// Minimal valid environment map rooted at `base`.
pub fn env_vars(base: &std::path::Path) -> HashMap<String, String> {
    HashMap::from([
        ("MODEL__API_KEY".to_string(), "sk-test".to_string()),
        ("DIRECTORY__BASE".to_string(), base.display().to_string()),
        (
            "MCP__PATH".to_string(),
            base.join("mcp.json").display().to_string(),
        ),
    ])
}
