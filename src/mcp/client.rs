//! Lazily connected client for one MCP server.

use rmcp::{
    model::{
        CallToolRequestParams, CallToolResult, Content, JsonObject, ProtocolVersion,
        ResourceContents,
    },
    service::{ClientInitializeError, Peer, RoleClient, ServiceError},
};
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ChattrError, Collaborator, Result};

use super::schema::{McpToolCallResult, McpToolSchema};
use super::transport::{McpRunningService, McpTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpConnectionState {
    Disconnected,
    Initialized,
    Closed,
}

struct Connection {
    transport: Box<dyn McpTransport>,
    session: Option<McpRunningService>,
    state: McpConnectionState,
}

/// Client for a Model Context Protocol server.
///
/// Nothing is dialed until the first request; a session that drops is
/// reopened on the next call. The lock covers connecting only, so requests
/// from concurrent turns run side by side on the shared session.
pub struct McpClient {
    server: String,
    request_timeout: Option<Duration>,
    connection: Mutex<Connection>,
}

impl McpClient {
    pub fn new(server: impl Into<String>, transport: Box<dyn McpTransport>) -> Self {
        Self {
            server: server.into(),
            request_timeout: transport.request_timeout(),
            connection: Mutex::new(Connection {
                transport,
                session: None,
                state: McpConnectionState::Disconnected,
            }),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub async fn connection_state(&self) -> McpConnectionState {
        self.connection.lock().await.state
    }

    /// Open (or reopen) the session.
    pub async fn initialize(&self) -> Result<()> {
        self.peer().await.map(|_| ())
    }

    pub async fn list_tools(&self) -> Result<Vec<McpToolSchema>> {
        let peer = self.peer().await?;

        let tools = match self.bounded(list_all(&peer)).await {
            Ok(tools) => tools,
            Err(error) if should_reconnect_after_service_error(&error) => {
                let peer = self.reconnect().await?;
                self.bounded(list_all(&peer))
                    .await
                    .map_err(|retry| map_service_error(&self.server, "list_tools", retry))?
            }
            Err(error) => return Err(map_service_error(&self.server, "list_tools", error)),
        };

        Ok(tools.into_iter().map(map_mcp_tool_schema).collect())
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<McpToolCallResult> {
        let arguments = coerce_tool_arguments(arguments)?;
        let peer = self.peer().await?;

        let result = match self.bounded(call(&peer, name, arguments.clone())).await {
            Ok(result) => result,
            Err(error) if should_reconnect_after_service_error(&error) => {
                let peer = self.reconnect().await?;
                self.bounded(call(&peer, name, arguments))
                    .await
                    .map_err(|retry| map_service_error(&self.server, "call_tool", retry))?
            }
            Err(error) => return Err(map_service_error(&self.server, "call_tool", error)),
        };

        map_call_result(&self.server, name, result)
    }

    /// Shut the session down. Later calls fail.
    pub async fn close(&self) {
        let mut conn = self.connection.lock().await;
        conn.state = McpConnectionState::Closed;
        if let Some(session) = conn.session.take() {
            if let Err(e) = session.cancel().await {
                debug!(server = %self.server, error = %e, "MCP session did not shut down cleanly");
            }
        }
    }

    /// A handle on the live session, connecting first if needed.
    async fn peer(&self) -> Result<Peer<RoleClient>> {
        let mut conn = self.connection.lock().await;
        if conn.state == McpConnectionState::Closed {
            return Err(self.error("MCP client is closed"));
        }
        if let Some(session) = conn.session.as_ref() {
            if !session.is_closed() {
                return Ok(session.peer().clone());
            }
            debug!(server = %self.server, "MCP session closed, reconnecting");
            conn.session = None;
        }

        let session = connect_with_protocol_fallback(&self.server, conn.transport.as_mut()).await?;
        info!(server = %self.server, endpoint = %conn.transport.endpoint(), "MCP session established");
        let peer = session.peer().clone();
        conn.session = Some(session);
        conn.state = McpConnectionState::Initialized;
        Ok(peer)
    }

    async fn reconnect(&self) -> Result<Peer<RoleClient>> {
        {
            let mut conn = self.connection.lock().await;
            if conn.state != McpConnectionState::Closed {
                conn.session = None;
                conn.state = McpConnectionState::Disconnected;
            }
        }
        self.peer().await
    }

    /// Apply the service's request timeout, if any.
    async fn bounded<T>(
        &self,
        request: impl Future<Output = std::result::Result<T, ServiceError>>,
    ) -> std::result::Result<T, ServiceError> {
        let Some(timeout) = self.request_timeout else {
            return request.await;
        };
        tokio::time::timeout(timeout, request)
            .await
            .unwrap_or(Err(ServiceError::Timeout { timeout }))
    }

    fn error(&self, message: impl Into<String>) -> ChattrError {
        ChattrError::upstream_message(Collaborator::ToolService(self.server.clone()), message)
    }
}

async fn connect_with_protocol_fallback(
    server: &str,
    transport: &mut dyn McpTransport,
) -> Result<McpRunningService> {
    let latest_client_info = rmcp::model::ClientInfo {
        protocol_version: ProtocolVersion::LATEST,
        ..Default::default()
    };

    match transport.connect(latest_client_info).await {
        Ok(session) => return Ok(session),
        Err(error) if should_retry_protocol_fallback(&error) => {}
        Err(error) => return Err(map_client_initialize_error(server, error)),
    }

    let fallback_client_info = rmcp::model::ClientInfo {
        protocol_version: ProtocolVersion::V_2024_11_05,
        ..Default::default()
    };
    transport
        .connect(fallback_client_info)
        .await
        .map_err(|e| map_client_initialize_error(server, e))
}

async fn list_all(
    peer: &Peer<RoleClient>,
) -> std::result::Result<Vec<rmcp::model::Tool>, ServiceError> {
    match peer.list_all_tools().await {
        Ok(tools) => Ok(tools),
        Err(ServiceError::UnexpectedResponse) => peer.list_tools(None).await.map(|page| page.tools),
        Err(error) => Err(error),
    }
}

async fn call(
    peer: &Peer<RoleClient>,
    name: &str,
    arguments: Option<JsonObject>,
) -> std::result::Result<CallToolResult, ServiceError> {
    peer.call_tool(CallToolRequestParams {
        meta: None,
        name: name.to_owned().into(),
        arguments,
        task: None,
    })
    .await
}

fn should_reconnect_after_service_error(error: &ServiceError) -> bool {
    matches!(
        error,
        ServiceError::TransportClosed | ServiceError::TransportSend(_)
    )
}

fn should_retry_protocol_fallback(error: &ClientInitializeError) -> bool {
    match error {
        ClientInitializeError::JsonRpcError(error) => {
            let message = error.message.to_ascii_lowercase();
            message.contains("protocol") && message.contains("version")
        }
        _ => false,
    }
}

fn map_mcp_tool_schema(tool: rmcp::model::Tool) -> McpToolSchema {
    McpToolSchema {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
    }
}

fn coerce_tool_arguments(value: serde_json::Value) -> Result<Option<JsonObject>> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
                ChattrError::Validation(format!("MCP tool arguments must be valid JSON: {e}"))
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(ChattrError::Validation(format!(
            "MCP tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn map_call_result(server: &str, name: &str, result: CallToolResult) -> Result<McpToolCallResult> {
    let text_content = extract_text_content(&result.content);
    let content = result
        .content
        .iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect::<Vec<_>>();

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or_else(|| text_content.clone())
            .unwrap_or_else(|| "tool returned an error result".into());

        return Err(ChattrError::upstream_message(
            Collaborator::ToolService(server.to_string()),
            format!("{name}: {message}"),
        ));
    }

    Ok(McpToolCallResult {
        structured_content: result.structured_content,
        text_content,
        content,
    })
}

fn map_client_initialize_error(server: &str, error: ClientInitializeError) -> ChattrError {
    let message = match error {
        ClientInitializeError::ConnectionClosed(context) => {
            format!("initialize connection closed: {context}")
        }
        ClientInitializeError::TransportError { error, context } => {
            format!("initialize transport error ({context}): {error}")
        }
        ClientInitializeError::JsonRpcError(error) => format!(
            "initialize JSON-RPC error {}: {}",
            error.code.0, error.message
        ),
        ClientInitializeError::Cancelled => "initialize cancelled".to_string(),
        other => format!("initialize error: {other}"),
    };
    ChattrError::upstream_message(Collaborator::ToolService(server.to_string()), message)
}

fn map_service_error(server: &str, context: &str, error: ServiceError) -> ChattrError {
    let message = match error {
        ServiceError::McpError(error) => {
            format!("{context}: MCP error {}: {}", error.code.0, error.message)
        }
        ServiceError::TransportSend(error) => format!("{context}: transport send failed: {error}"),
        ServiceError::TransportClosed => format!("{context}: transport closed"),
        ServiceError::UnexpectedResponse => format!("{context}: unexpected MCP response"),
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            format!("{context}: request cancelled{suffix}")
        }
        ServiceError::Timeout { timeout } => {
            format!("{context}: timed out after {}ms", timeout.as_millis())
        }
        other => format!("{context}: {other}"),
    };
    ChattrError::upstream_message(Collaborator::ToolService(server.to_string()), message)
}
