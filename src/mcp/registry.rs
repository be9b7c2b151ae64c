//! Capability registry: every configured MCP server behind one tool list.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;
use crate::tools::{ToolArguments, ToolHandle, ToolParameters};

use super::client::McpClient;
use super::descriptor::{load_descriptors, ServerDescriptor};
use super::schema::{McpToolCallResult, McpToolSchema};
use super::transport::transport_for;

/// Client operations the registry needs from one server.
///
/// Calls may overlap; implementations serialize only their own connection
/// setup.
#[async_trait]
pub trait McpClientOps: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<McpToolSchema>>;
    async fn call_tool(&self, name: &str, arguments: serde_json::Value)
        -> Result<McpToolCallResult>;
    async fn close(&self);
}

#[async_trait]
impl McpClientOps for McpClient {
    async fn list_tools(&self) -> Result<Vec<McpToolSchema>> {
        McpClient::list_tools(self).await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<McpToolCallResult> {
        McpClient::call_tool(self, name, arguments).await
    }

    async fn close(&self) {
        McpClient::close(self).await
    }
}

struct ServerEntry {
    name: String,
    client: Arc<dyn McpClientOps>,
    /// Tool list from the last successful listing.
    tools: RwLock<Option<Vec<McpToolSchema>>>,
}

impl ServerEntry {
    async fn tools(&self) -> Result<Vec<McpToolSchema>> {
        if let Some(tools) = self.tools.read().await.as_ref() {
            return Ok(tools.clone());
        }
        let tools = self.client.list_tools().await?;
        debug!(server = %self.name, tools = tools.len(), "listed MCP tools");
        *self.tools.write().await = Some(tools.clone());
        Ok(tools)
    }
}

/// All tool services from the descriptor file.
///
/// Servers are dialed on the first [`CapabilityRegistry::capabilities`] call.
/// A server that cannot be reached contributes no tools and is tried again
/// next time.
pub struct CapabilityRegistry {
    servers: Vec<ServerEntry>,
}

impl CapabilityRegistry {
    /// Read the descriptor file and prepare one lazy client per server.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_descriptors(load_descriptors(path)?))
    }

    pub fn from_descriptors(descriptors: Vec<ServerDescriptor>) -> Self {
        let clients = descriptors
            .iter()
            .map(|d| {
                let client: Arc<dyn McpClientOps> =
                    Arc::new(McpClient::new(d.name.clone(), transport_for(d)));
                (d.name.clone(), client)
            })
            .collect();
        Self::from_clients(clients)
    }

    /// Build from already-constructed clients, in order.
    pub fn from_clients(clients: Vec<(String, Arc<dyn McpClientOps>)>) -> Self {
        let servers = clients
            .into_iter()
            .map(|(name, client)| ServerEntry {
                name,
                client,
                tools: RwLock::new(None),
            })
            .collect();
        Self { servers }
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name.as_str()).collect()
    }

    /// Tool handles for every reachable server.
    ///
    /// Names that appear on more than one server are exposed as
    /// `<server>__<tool>`; unique names are kept as-is.
    pub async fn capabilities(&self) -> Vec<Arc<dyn ToolHandle>> {
        let mut listed: Vec<(&ServerEntry, Vec<McpToolSchema>)> = Vec::new();

        for server in &self.servers {
            match server.tools().await {
                Ok(tools) => listed.push((server, tools)),
                Err(e) => {
                    warn!(server = %server.name, error = %e, "MCP server unavailable, skipping its tools");
                }
            }
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (_, tools) in &listed {
            for tool in tools {
                *counts.entry(tool.name.as_str()).or_default() += 1;
            }
        }

        let mut handles: Vec<Arc<dyn ToolHandle>> = Vec::new();
        for (server, tools) in &listed {
            for tool in tools {
                let exposed_name = if counts.get(tool.name.as_str()).copied().unwrap_or(0) > 1 {
                    format!("{}__{}", server.name, tool.name)
                } else {
                    tool.name.clone()
                };
                handles.push(Arc::new(McpToolHandle {
                    server: server.name.clone(),
                    remote_name: tool.name.clone(),
                    exposed_name,
                    description: tool.description.clone().unwrap_or_default(),
                    parameters: ToolParameters::from_schema(tool.input_schema.clone()),
                    client: Arc::clone(&server.client),
                }));
            }
        }
        handles
    }

    /// Close every session.
    pub async fn close(&self) {
        for server in &self.servers {
            server.client.close().await;
            *server.tools.write().await = None;
        }
    }
}

/// One remote tool, routed to its server.
pub struct McpToolHandle {
    server: String,
    remote_name: String,
    exposed_name: String,
    description: String,
    parameters: ToolParameters,
    client: Arc<dyn McpClientOps>,
}

impl McpToolHandle {
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

#[async_trait]
impl ToolHandle for McpToolHandle {
    fn name(&self) -> &str {
        &self.exposed_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn invoke(&self, args: &ToolArguments) -> Result<serde_json::Value> {
        let result = self
            .client
            .call_tool(&self.remote_name, args.raw().clone())
            .await?;
        Ok(result.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ChattrError, Collaborator};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockClient {
        server: String,
        tools: Vec<&'static str>,
        fail_listings: usize,
        list_calls: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    impl MockClient {
        fn boxed(server: &str, tools: Vec<&'static str>, fail_listings: usize) -> (Arc<dyn McpClientOps>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let list_calls = Arc::new(AtomicUsize::new(0));
            let closed = Arc::new(AtomicUsize::new(0));
            let client = Self {
                server: server.into(),
                tools,
                fail_listings,
                list_calls: Arc::clone(&list_calls),
                closed: Arc::clone(&closed),
            };
            (Arc::new(client), list_calls, closed)
        }
    }

    #[async_trait]
    impl McpClientOps for MockClient {
        async fn list_tools(&self) -> Result<Vec<McpToolSchema>> {
            let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_listings {
                return Err(ChattrError::upstream_message(
                    Collaborator::ToolService(self.server.clone()),
                    "connection refused",
                ));
            }
            Ok(self
                .tools
                .iter()
                .map(|name| McpToolSchema {
                    name: (*name).into(),
                    description: Some(format!("{name} on {}", self.server)),
                    input_schema: json!({"type": "object"}),
                })
                .collect())
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: serde_json::Value,
        ) -> Result<McpToolCallResult> {
            if name == "generate_video_mcp" {
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
            Ok(McpToolCallResult {
                structured_content: Some(json!({"server": self.server, "tool": name, "args": arguments})),
                text_content: None,
                content: Vec::new(),
            })
        }

        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn names(handles: &[Arc<dyn ToolHandle>]) -> Vec<String> {
        handles.iter().map(|h| h.name().to_string()).collect()
    }

    #[tokio::test]
    async fn colliding_names_are_namespaced() {
        let (voice, _, _) = MockClient::boxed("voice", vec!["generate_audio_for_text", "status"], 0);
        let (video, _, _) = MockClient::boxed("video", vec!["generate_video_mcp", "status"], 0);
        let registry = CapabilityRegistry::from_clients(vec![("voice".into(), voice), ("video".into(), video)]);

        let handles = registry.capabilities().await;
        assert_eq!(
            names(&handles),
            vec!["generate_audio_for_text", "voice__status", "generate_video_mcp", "video__status"]
        );
    }

    #[tokio::test]
    async fn invoke_routes_to_remote_name() {
        let (voice, _, _) = MockClient::boxed("voice", vec!["status"], 0);
        let (video, _, _) = MockClient::boxed("video", vec!["status"], 0);
        let registry = CapabilityRegistry::from_clients(vec![("voice".into(), voice), ("video".into(), video)]);

        let handles = registry.capabilities().await;
        let video_status = handles.iter().find(|h| h.name() == "video__status").unwrap();
        let out = video_status
            .invoke(&ToolArguments::new(json!({"verbose": true})))
            .await
            .unwrap();
        assert_eq!(out, json!({"server": "video", "tool": "status", "args": {"verbose": true}}));
    }

    #[tokio::test]
    async fn unreachable_server_is_skipped_then_retried() {
        let (voice, voice_calls, _) = MockClient::boxed("voice", vec!["generate_audio_for_text"], 1);
        let (video, video_calls, _) = MockClient::boxed("video", vec!["generate_video_mcp"], 0);
        let registry = CapabilityRegistry::from_clients(vec![("voice".into(), voice), ("video".into(), video)]);

        let first = registry.capabilities().await;
        assert_eq!(names(&first), vec!["generate_video_mcp"]);

        let second = registry.capabilities().await;
        assert_eq!(names(&second), vec!["generate_audio_for_text", "generate_video_mcp"]);

        // successful listings are cached
        let _ = registry.capabilities().await;
        assert_eq!(voice_calls.load(Ordering::SeqCst), 2);
        assert_eq!(video_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_reaches_every_client() {
        let (voice, _, voice_closed) = MockClient::boxed("voice", vec![], 0);
        let (video, _, video_closed) = MockClient::boxed("video", vec![], 0);
        let registry = CapabilityRegistry::from_clients(vec![("voice".into(), voice), ("video".into(), video)]);

        registry.close().await;
        assert_eq!(voice_closed.load(Ordering::SeqCst), 1);
        assert_eq!(video_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_registry_has_no_capabilities() {
        let registry = CapabilityRegistry::from_descriptors(Vec::new());
        assert!(registry.is_empty());
        assert!(registry.capabilities().await.is_empty());
    }

    #[tokio::test]
    async fn slow_call_does_not_hold_up_listing_or_other_calls() {
        let (video, _, _) = MockClient::boxed("video", vec!["generate_video_mcp", "status"], 0);
        let registry = Arc::new(CapabilityRegistry::from_clients(vec![("video".into(), video)]));
        let handles = registry.capabilities().await;
        let slow = handles.iter().find(|h| h.name() == "generate_video_mcp").unwrap().clone();
        let quick = handles.iter().find(|h| h.name() == "status").unwrap().clone();

        let running = tokio::spawn(async move { slow.invoke(&ToolArguments::new(json!({}))).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let listed = tokio::time::timeout(Duration::from_secs(1), registry.capabilities())
            .await
            .expect("listing waited on a running call");
        assert_eq!(listed.len(), 2);
        tokio::time::timeout(Duration::from_secs(1), quick.invoke(&ToolArguments::new(json!({}))))
            .await
            .expect("second call waited on a running call")
            .unwrap();

        running.await.unwrap().unwrap();
    }
}
