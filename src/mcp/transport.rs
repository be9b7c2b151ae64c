//! MCP transports: spawn a child process or talk streamable HTTP.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rmcp::model::ClientInfo;
use rmcp::service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceExt};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use tokio::process::Command;
use tracing::warn;

use super::descriptor::{ServerDescriptor, TransportKind};

pub type DynClientService = Box<dyn DynService<RoleClient>>;
pub type McpRunningService = RunningService<RoleClient, DynClientService>;

/// Something that can open a fresh, initialized MCP session.
#[async_trait]
pub trait McpTransport: Send {
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<McpRunningService, ClientInitializeError>;

    /// Where this transport points (for logs).
    fn endpoint(&self) -> String;

    /// Limit for one list or call request, if the service has one.
    fn request_timeout(&self) -> Option<Duration> {
        None
    }
}

/// Local MCP server spoken to over stdin/stdout.
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl StdioTransport {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            cwd: None,
            timeout: None,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.command);
        command.args(&self.args).envs(&self.env);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<McpRunningService, ClientInitializeError> {
        let transport = TokioChildProcess::new(self.command()).map_err(|error| {
            ClientInitializeError::transport::<TokioChildProcess>(error, "spawn stdio transport")
        })?;

        client_info.into_dyn().serve(transport).await
    }

    fn endpoint(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Remote MCP server over streamable HTTP. Also serves `sse` and `http` entries.
pub struct StreamableHttpTransport {
    url: String,
    headers: HeaderMap,
    read_timeout: Option<Duration>,
    timeout: Option<Duration>,
}

impl StreamableHttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HeaderMap::new(),
            read_timeout: None,
            timeout: None,
        }
    }

    /// Headers sent with every request. Invalid entries are skipped.
    pub fn with_headers(mut self, headers: &HashMap<String, String>) -> Self {
        for (name, value) in headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    self.headers.insert(name, value);
                }
                _ => warn!(url = %self.url, header = %name, "skipping invalid MCP header"),
            }
        }
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn http_client(&self) -> reqwest::Client {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .default_headers(self.headers.clone());
        if let Some(read_timeout) = self.read_timeout {
            builder = builder.read_timeout(read_timeout);
        }
        builder.build().unwrap_or_else(|e| {
            warn!(url = %self.url, error = %e, "failed to build MCP HTTP client, using defaults");
            reqwest::Client::new()
        })
    }
}

#[async_trait]
impl McpTransport for StreamableHttpTransport {
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<McpRunningService, ClientInitializeError> {
        let transport = StreamableHttpClientTransport::with_client(
            self.http_client(),
            StreamableHttpClientTransportConfig::with_uri(self.url.clone()),
        );
        client_info.into_dyn().serve(transport).await
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Pick the transport for a validated descriptor.
pub fn transport_for(descriptor: &ServerDescriptor) -> Box<dyn McpTransport> {
    match descriptor.transport {
        TransportKind::Stdio => Box::new(
            StdioTransport::new(
                descriptor.command.clone().unwrap_or_default(),
                descriptor.args.clone(),
            )
            .with_env(descriptor.env.clone())
            .with_cwd(descriptor.cwd.clone())
            .with_timeout(descriptor.request_timeout()),
        ),
        TransportKind::Sse | TransportKind::StreamableHttp | TransportKind::Http => Box::new(
            StreamableHttpTransport::new(descriptor.url.clone().unwrap_or_default())
                .with_headers(&descriptor.headers)
                .with_read_timeout(descriptor.read_timeout())
                .with_timeout(descriptor.request_timeout()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(transport: TransportKind) -> ServerDescriptor {
        ServerDescriptor {
            name: "voice".into(),
            kind: None,
            url: Some("http://localhost:8000/mcp".into()),
            command: Some("uvx".into()),
            args: vec!["voice-server".into()],
            transport,
            headers: HashMap::from([("Authorization".into(), "Bearer abc".into())]),
            timeout: Some(45.0),
            sse_read_timeout: None,
            env: HashMap::from([("HF_HOME".into(), "/data".into())]),
            cwd: Some("/srv/tools".into()),
        }
    }

    #[test]
    fn remote_kinds_share_the_http_transport() {
        for kind in [TransportKind::Sse, TransportKind::Http, TransportKind::StreamableHttp] {
            assert_eq!(transport_for(&descriptor(kind)).endpoint(), "http://localhost:8000/mcp");
        }
    }

    #[test]
    fn stdio_endpoint_is_the_command_line() {
        assert_eq!(
            transport_for(&descriptor(TransportKind::Stdio)).endpoint(),
            "uvx voice-server"
        );
    }

    #[test]
    fn descriptor_options_reach_the_transport() {
        for kind in [TransportKind::Stdio, TransportKind::StreamableHttp] {
            assert_eq!(
                transport_for(&descriptor(kind)).request_timeout(),
                Some(Duration::from_secs(45))
            );
        }

        let http = StreamableHttpTransport::new("http://localhost:8000/mcp")
            .with_headers(&HashMap::from([("Authorization".into(), "Bearer abc".into())]));
        assert_eq!(http.headers()["authorization"], "Bearer abc");
    }

    #[test]
    fn stdio_command_carries_env_and_cwd() {
        let stdio = StdioTransport::new("uvx", vec!["voice-server".into()])
            .with_env(HashMap::from([("HF_HOME".into(), "/data".into())]))
            .with_cwd(Some("/srv/tools".into()));
        let command = stdio.command();
        let std_command = command.as_std();

        assert_eq!(std_command.get_current_dir(), Some(std::path::Path::new("/srv/tools")));
        assert!(std_command
            .get_envs()
            .any(|(k, v)| k == "HF_HOME" && v == Some(std::ffi::OsStr::new("/data"))));
    }
}
