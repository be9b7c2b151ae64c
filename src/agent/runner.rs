//! The model/tool loop behind a single turn.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::{ChattrError, Collaborator, Result};
use crate::media::{ArtifactStore, MediaRouter};
use crate::provider::{ModelProvider, ProviderRequest, ToolDefinition};
use crate::tools::{ToolArguments, ToolHandle};
use crate::types::{AgentToolCall, ModelMessage, StreamEventType, ToolOutput};

use super::events::AgentEvent;

/// Streams the model, runs the tools it asks for, and feeds results back
/// until the model answers without tool calls.
pub struct ToolLoop {
    provider: Arc<dyn ModelProvider>,
    tools: Vec<Arc<dyn ToolHandle>>,
    media: MediaRouter,
    artifacts: ArtifactStore,
    temperature: f64,
    max_iterations: usize,
}

impl ToolLoop {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        tools: Vec<Arc<dyn ToolHandle>>,
        media: MediaRouter,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            provider,
            tools,
            media,
            artifacts,
            temperature: 0.0,
            max_iterations: 8,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Run the loop over `messages`. Errors end the stream.
    pub fn run(self, mut messages: Vec<ModelMessage>) -> BoxStream<'static, Result<AgentEvent>> {
        let definitions: Vec<ToolDefinition> = self.tools.iter().map(|t| t.definition()).collect();

        let stream = async_stream::stream! {
            for iteration in 1..=self.max_iterations {
                let request = ProviderRequest {
                    messages: messages.clone(),
                    temperature: Some(self.temperature),
                    tools: definitions.clone(),
                };

                let mut deltas = match self.provider.stream_text(&request).await {
                    Ok(deltas) => deltas,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                let mut text = String::new();
                let mut calls: Vec<AgentToolCall> = Vec::new();
                while let Some(delta) = deltas.next().await {
                    let delta = match delta {
                        Ok(delta) => delta,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    };
                    match delta.event_type {
                        StreamEventType::TextDelta => {
                            if !delta.text.is_empty() {
                                text.push_str(&delta.text);
                                yield Ok(AgentEvent::fragment(delta.text));
                            }
                        }
                        StreamEventType::ToolCalls => calls.extend(delta.tool_calls),
                        StreamEventType::Done => break,
                    }
                }

                debug!(iteration, tool_calls = calls.len(), text_len = text.len(), "model iteration complete");

                if calls.is_empty() {
                    return;
                }

                messages.push(ModelMessage::assistant_tool_calls(text, calls.clone()));

                for call in calls {
                    yield Ok(AgentEvent::tool_started(call.name.clone(), call.arguments.clone()));
                    let (output, result, is_error) = self.invoke(&call).await;
                    yield Ok(AgentEvent::tool_completed(call.name.clone(), output));
                    messages.push(ModelMessage::tool_result(call.id, result, is_error));
                }
            }

            yield Err(ChattrError::upstream_message(
                Collaborator::Model,
                format!("tool loop exceeded {} iterations", self.max_iterations),
            ));
        };

        Box::pin(stream)
    }

    /// Returns the classified output, the value reported back to the model,
    /// and whether the call failed.
    async fn invoke(&self, call: &AgentToolCall) -> (ToolOutput, serde_json::Value, bool) {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            let message = format!("Tool '{}' not found", call.name);
            warn!(tool = %call.name, "model called an unknown tool");
            return (
                ToolOutput::error(message.clone()),
                serde_json::json!({ "error": message }),
                true,
            );
        };

        let args = ToolArguments::new(call.arguments.clone());
        match tool.invoke(&args).await {
            Ok(value) => {
                debug!(tool = %call.name, "tool call succeeded");
                let mut output = self.media.classify(&call.name, &value);
                if let Some(reference) = output.reference.take() {
                    output.reference = Some(self.artifacts.materialize(output.kind, &reference).await);
                }
                (output, value, false)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool call failed");
                (
                    ToolOutput::error(e.to_string()),
                    serde_json::json!({ "error": e.to_string() }),
                    true,
                )
            }
        }
    }
}
