//! Tool-service descriptor file (`mcp.json`).
//!
//! ```json
//! {"mcp_servers": [
//!   {"name": "voice", "type": "url", "url": "http://localhost:8000/mcp", "transport": "streamable-http",
//!    "headers": {"Authorization": "Bearer ..."}, "timeout": 120},
//!   {"name": "local", "command": "uvx", "args": ["some-server"], "transport": "stdio",
//!    "env": {"HF_HOME": "/data"}, "cwd": "/srv/tools"}
//! ]}
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};

use serde::Deserialize;
use strum::Display;
use tracing::{info, warn};

use crate::error::{ChattrError, Result};

/// How to reach a tool service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TransportKind {
    /// Legacy name; served by the streamable HTTP client.
    Sse,
    StreamableHttp,
    Http,
    Stdio,
}

impl TransportKind {
    pub fn is_remote(self) -> bool {
        !matches!(self, Self::Stdio)
    }
}

/// One tool service entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerDescriptor {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub transport: TransportKind,
    /// Extra request headers for remote services.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Seconds allowed for one list or call request.
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Seconds a remote event stream may stay silent.
    #[serde(default)]
    pub sse_read_timeout: Option<f64>,
    /// Environment for a stdio child, on top of the inherited one.
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl ServerDescriptor {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs_f64)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.sse_read_timeout.map(Duration::from_secs_f64)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct McpScheme {
    #[serde(default)]
    mcp_servers: Vec<ServerDescriptor>,
}

/// Read and validate the descriptor file.
///
/// A missing file is a degraded but valid state and yields no descriptors.
pub fn load_descriptors(path: &Path) -> Result<Vec<ServerDescriptor>> {
    if !path.exists() {
        warn!(path = %path.display(), "MCP config file not found, continuing without tools");
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path).map_err(|e| {
        ChattrError::Configuration(format!("Cannot read MCP config {}: {e}", path.display()))
    })?;
    let descriptors = parse_descriptors(&raw)
        .map_err(|msg| ChattrError::Configuration(format!("{}: {msg}", path.display())))?;

    info!(path = %path.display(), servers = descriptors.len(), "loaded MCP config");
    Ok(descriptors)
}

fn parse_descriptors(raw: &str) -> std::result::Result<Vec<ServerDescriptor>, String> {
    let scheme: McpScheme =
        serde_json::from_str(raw).map_err(|e| format!("malformed MCP config: {e}"))?;

    let mut seen = HashSet::new();
    for server in &scheme.mcp_servers {
        if server.name.trim().is_empty() {
            return Err("server entry with an empty name".into());
        }
        if !seen.insert(server.name.as_str()) {
            return Err(format!("duplicate server name '{}'", server.name));
        }
        if server.transport.is_remote() {
            if server.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                return Err(format!(
                    "server '{}' uses {} transport but has no url",
                    server.name, server.transport
                ));
            }
        } else if server.command.as_deref().map_or(true, |c| c.trim().is_empty()) {
            return Err(format!(
                "server '{}' uses stdio transport but has no command",
                server.name
            ));
        }
        for (field, value) in [("timeout", server.timeout), ("sse_read_timeout", server.sse_read_timeout)] {
            if value.is_some_and(|secs| !secs.is_finite() || secs <= 0.0) {
                return Err(format!("server '{}' has a non-positive {field}", server.name));
            }
        }
        for (key, value) in &server.headers {
            if HeaderName::from_bytes(key.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
                return Err(format!("server '{}' has an invalid header '{key}'", server.name));
            }
        }
    }
    Ok(scheme.mcp_servers)
}
