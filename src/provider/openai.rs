//! OpenAI Chat Completions API provider (works with any compatible endpoint).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::config::SecretString;
use crate::error::{ChattrError, Collaborator, Result};
use crate::types::*;

use super::http::{bearer_headers, drain_lines, parse_sse_data, shared_client, status_to_error};
use super::{ModelProvider, ProviderRequest};

pub struct OpenAiProvider {
    model: String,
    api_key: SecretString,
    base_url: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(
        model: impl Into<String>,
        api_key: SecretString,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            model: model.into(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn build_request_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let messages = request
            .messages
            .iter()
            .map(message_to_openai)
            .collect::<Vec<_>>();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(temp) = request.temperature {
                obj.insert("temperature".into(), temp.into());
            }
            if !request.tools.is_empty() {
                let tool_defs: Vec<serde_json::Value> = request
                    .tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tool_defs.into());
            }
        }

        body
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta>>> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %self.model, messages = request.messages.len(), tools = request.tools.len(), "OpenAI stream_text");

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(self.api_key.expose()))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChattrError::upstream(Collaborator::Model, e))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(Collaborator::Model, status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut pending = PendingToolCalls::default();
            let mut finished = false;
            futures::pin_mut!(byte_stream);

            'read: while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ChattrError::upstream(Collaborator::Model, e));
                        return;
                    }
                };

                buffer.extend_from_slice(&chunk);

                for line in drain_lines(&mut buffer) {
                    if line == "data: [DONE]" || line == "data:[DONE]" {
                        break 'read;
                    }
                    let Some(data) = parse_sse_data(&line) else {
                        continue;
                    };
                    let chunk = match serde_json::from_str::<OpenAiStreamChunk>(data) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            debug!(error = %e, "skipping unparseable stream chunk");
                            continue;
                        }
                    };
                    if let Some(err) = chunk.error {
                        yield Err(ChattrError::upstream_message(Collaborator::Model, err.message));
                        return;
                    }
                    let usage = chunk.usage.map(Usage::from);
                    let Some(choice) = chunk.choices.into_iter().next() else {
                        continue;
                    };
                    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                        yield Ok(TextStreamDelta::text(text));
                    }
                    for call in choice.delta.tool_calls.unwrap_or_default() {
                        pending.push(call);
                    }
                    if let Some(reason) = choice.finish_reason.as_deref() {
                        if !pending.is_empty() {
                            yield Ok(TextStreamDelta::tool_calls(pending.take()));
                        }
                        yield Ok(TextStreamDelta::done(FinishReason::parse(reason), usage));
                        finished = true;
                    }
                }
            }

            if !finished {
                if !pending.is_empty() {
                    yield Ok(TextStreamDelta::tool_calls(pending.take()));
                }
                yield Ok(TextStreamDelta::done(None, None));
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Tool calls arrive in fragments keyed by index; arguments are concatenated.
#[derive(Default)]
struct PendingToolCalls {
    calls: BTreeMap<u32, PartialToolCall>,
}

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PendingToolCalls {
    fn push(&mut self, delta: OpenAiToolCallDelta) {
        let entry = self.calls.entry(delta.index).or_default();
        if let Some(id) = delta.id {
            entry.id = id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                entry.name.push_str(&name);
            }
            if let Some(args) = function.arguments {
                entry.arguments.push_str(&args);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn take(&mut self) -> Vec<AgentToolCall> {
        std::mem::take(&mut self.calls)
            .into_iter()
            .map(|(index, call)| AgentToolCall {
                id: if call.id.is_empty() {
                    format!("call_{index}")
                } else {
                    call.id
                },
                name: call.name,
                arguments: parse_arguments(&call.arguments),
            })
            .collect()
    }
}

fn parse_arguments(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn message_to_openai(msg: &ModelMessage) -> serde_json::Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    if let Some(ContentPart::ToolResult(tr)) = msg.content.first() {
        let content = match &tr.result {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return serde_json::json!({
            "role": "tool",
            "tool_call_id": tr.tool_call_id,
            "content": content,
        });
    }

    let tool_calls = msg.tool_calls();
    if !tool_calls.is_empty() {
        let tc_json: Vec<serde_json::Value> = tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments.to_string(),
                    }
                })
            })
            .collect();
        let text = msg.text_content();
        return serde_json::json!({
            "role": role,
            "content": if text.is_empty() { serde_json::Value::Null } else { serde_json::Value::String(text) },
            "tool_calls": tc_json,
        });
    }

    serde_json::json!({ "role": role, "content": msg.text_content() })
}

// OpenAI API response types (internal)

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<OpenAiUsage> for Usage {
    fn from(u: OpenAiUsage) -> Self {
        Self {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
    error: Option<OpenAiErrorBody>,
}

#[derive(Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Deserialize)]
struct OpenAiToolCallDelta {
    #[serde(default)]
    index: u32,
    id: Option<String>,
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Deserialize)]
struct OpenAiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(index: u32, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> OpenAiToolCallDelta {
        OpenAiToolCallDelta {
            index,
            id: id.map(String::from),
            function: Some(OpenAiFunctionDelta {
                name: name.map(String::from),
                arguments: args.map(String::from),
            }),
        }
    }

    #[test]
    fn fragments_assemble_by_index() {
        let mut pending = PendingToolCalls::default();
        pending.push(delta(0, Some("call_a"), Some("tts"), Some("{\"text\":")));
        pending.push(delta(1, Some("call_b"), Some("video"), Some("")));
        pending.push(delta(0, None, None, Some("\"Bonjour\"}")));

        let calls = pending.take();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].arguments, serde_json::json!({"text": "Bonjour"}));
        assert_eq!(calls[1].name, "video");
        assert_eq!(calls[1].arguments, serde_json::json!({}));
        assert!(pending.is_empty());
    }

    #[test]
    fn invalid_arguments_are_kept_raw() {
        assert_eq!(
            parse_arguments("{not json"),
            serde_json::Value::String("{not json".into())
        );
    }

    #[test]
    fn tool_result_message_uses_plain_string_content() {
        let msg = ModelMessage::tool_result("call_1", serde_json::json!("done"), false);
        let json = message_to_openai(&msg);
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert_eq!(json["content"], "done");
    }

    #[test]
    fn assistant_tool_call_message_has_null_content() {
        let msg = ModelMessage::assistant_tool_calls(
            "",
            vec![AgentToolCall {
                id: "call_1".into(),
                name: "tts".into(),
                arguments: serde_json::json!({"text": "hi"}),
            }],
        );
        let json = message_to_openai(&msg);
        assert!(json["content"].is_null());
        assert_eq!(json["tool_calls"][0]["function"]["arguments"], "{\"text\":\"hi\"}");
    }

    #[test]
    fn request_body_carries_temperature_and_tools() {
        let provider = OpenAiProvider::new(
            "gpt-4o-mini",
            SecretString::new("k"),
            "https://api.openai.com/v1/",
            Duration::from_secs(5),
        );
        let request = ProviderRequest {
            messages: vec![ModelMessage::user("hi")],
            temperature: Some(0.2),
            tools: vec![super::super::ToolDefinition {
                name: "tts".into(),
                description: "speak".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
        };
        let body = provider.build_request_body(&request);
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["tools"][0]["function"]["name"], "tts");
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
    }
}
