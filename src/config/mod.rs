//! Configuration (layered: `.env` > `chattr.toml` > process environment).
//!
//! Keys are grouped by section with a double-underscore delimiter, so
//! `MODEL__API_KEY` lands in `settings.model.api_key` and
//! `VECTOR_DATABASE__NAME` in `settings.vector_database.name`.
//!
//! Settings are loaded once at startup and passed around explicitly; there is
//! no global instance.

pub mod directory;
pub mod secret;

pub use directory::DirectorySettings;
pub use secret::SecretString;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono_tz::Tz;
use reqwest::Url;
use serde::Deserialize;
use strum::{Display, EnumString};

use crate::error::{ChattrError, Result};

const DEFAULT_MODEL_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL_NAME: &str = "gpt-4o-mini";
const DEFAULT_VECTOR_DATABASE_URL: &str = "http://localhost:6333";

/// Settings for the language model endpoint (OpenAI-compatible).
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model_url")]
    pub url: String,
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    #[serde(default = "default_embedding_name")]
    pub embedding_name: String,
    #[serde(default = "default_embedding_dims")]
    pub embedding_dims: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            url: default_model_url(),
            name: default_model_name(),
            api_key: None,
            temperature: 0.0,
            max_tool_iterations: default_max_tool_iterations(),
            embedding_name: default_embedding_name(),
            embedding_dims: default_embedding_dims(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ModelSettings {
    /// The API key, or a configuration error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&SecretString> {
        match &self.api_key {
            Some(key) if !key.is_blank() => Ok(key),
            _ => Err(ChattrError::Configuration(
                "Model API key is missing. Set it with `MODEL__API_KEY`".into(),
            )),
        }
    }
}

fn default_model_url() -> String {
    DEFAULT_MODEL_URL.to_string()
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

fn default_max_tool_iterations() -> usize {
    8
}

fn default_embedding_name() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dims() -> usize {
    384
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Settings for the Qdrant-backed knowledge index.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorDatabaseSettings {
    #[serde(default = "default_collection")]
    pub name: String,
    #[serde(default = "default_vector_database_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for VectorDatabaseSettings {
    fn default() -> Self {
        Self {
            name: default_collection(),
            url: default_vector_database_url(),
            api_key: None,
            top_k: default_top_k(),
        }
    }
}

fn default_collection() -> String {
    "chattr".to_string()
}

fn default_vector_database_url() -> String {
    DEFAULT_VECTOR_DATABASE_URL.to_string()
}

fn default_top_k() -> usize {
    3
}

/// Settings for the per-session conversation store.
#[derive(Debug, Clone, Deserialize)]
pub struct ShortTermMemorySettings {
    /// `file://<dir>` or `memory://`. Defaults to `file://<base>/agno`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for ShortTermMemorySettings {
    fn default() -> Self {
        Self {
            url: None,
            ttl_secs: default_ttl_secs(),
            max_turns: default_max_turns(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    86_400
}

fn default_max_turns() -> usize {
    20
}

/// Settings for the MCP tool descriptor file and media routing.
#[derive(Debug, Clone, Deserialize)]
pub struct McpSettings {
    #[serde(default = "default_mcp_path")]
    pub path: PathBuf,
    #[serde(default = "default_audio_tools")]
    pub audio_tools: Vec<String>,
    #[serde(default = "default_video_tools")]
    pub video_tools: Vec<String>,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            path: default_mcp_path(),
            audio_tools: default_audio_tools(),
            video_tools: default_video_tools(),
        }
    }
}

fn default_mcp_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("mcp.json")
}

fn default_audio_tools() -> Vec<String> {
    vec!["generate_audio_for_text".to_string()]
}

fn default_video_tools() -> Vec<String> {
    vec!["generate_video_mcp".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharacterSettings {
    #[serde(default = "default_character")]
    pub name: String,
}

impl Default for CharacterSettings {
    fn default() -> Self {
        Self {
            name: default_character(),
        }
    }
}

fn default_character() -> String {
    "Napoleon".to_string()
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7860
}

/// Process-wide settings. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub vector_database: VectorDatabaseSettings,
    #[serde(default)]
    pub short_term_memory: ShortTermMemorySettings,
    #[serde(default)]
    pub directory: DirectorySettings,
    #[serde(default)]
    pub mcp: McpSettings,
    #[serde(default)]
    pub character: CharacterSettings,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub debug: bool,
}

fn default_timezone() -> String {
    "Africa/Cairo".to_string()
}

impl Settings {
    /// Load from `.env`, an optional `chattr.toml`, and the process environment.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let builder = config::Config::builder()
            .add_source(config::File::with_name("chattr").required(false))
            .add_source(environment());
        Self::finish(builder)
    }

    /// Load from an explicit variable map instead of the process environment.
    ///
    /// Keys use the same `SECTION__KEY` form as the environment.
    pub fn from_source(vars: HashMap<String, String>) -> Result<Self> {
        let builder = config::Config::builder().add_source(environment().source(Some(vars)));
        Self::finish(builder)
    }

    fn finish(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ChattrError::Configuration(format!("Invalid settings: {e}")))?;
        settings.validate()?;
        settings.directory.ensure()?;
        Ok(settings)
    }

    /// Check every invariant that does not need I/O.
    pub fn validate(&self) -> Result<()> {
        self.model.require_api_key()?;
        parse_http_url("MODEL__URL", &self.model.url)?;
        if self.model.name.trim().is_empty() {
            return Err(ChattrError::Configuration(
                "Model name is missing. Set it with `MODEL__NAME`".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.model.temperature) {
            return Err(ChattrError::Validation(format!(
                "MODEL__TEMPERATURE must be within [0.0, 1.0], got {}",
                self.model.temperature
            )));
        }
        if self.model.max_tool_iterations == 0 {
            return Err(ChattrError::Validation(
                "MODEL__MAX_TOOL_ITERATIONS must be at least 1".into(),
            ));
        }
        if self.model.embedding_dims == 0 {
            return Err(ChattrError::Validation(
                "MODEL__EMBEDDING_DIMS must be positive".into(),
            ));
        }

        parse_http_url("VECTOR_DATABASE__URL", &self.vector_database.url)?;
        if self.vector_database.name.trim().is_empty() {
            return Err(ChattrError::Configuration(
                "Collection name is missing. Set it with `VECTOR_DATABASE__NAME`".into(),
            ));
        }

        let store_url = self.session_store_url();
        if !(store_url.starts_with("file://") || store_url.starts_with("memory://")) {
            return Err(ChattrError::Configuration(format!(
                "SHORT_TERM_MEMORY__URL must use file:// or memory://, got {store_url}"
            )));
        }

        if self.mcp.path.extension().and_then(|e| e.to_str()) != Some("json") {
            return Err(ChattrError::Configuration(format!(
                "MCP config file must be a JSON file: {}",
                self.mcp.path.display()
            )));
        }

        if self.character.name.trim().is_empty() {
            return Err(ChattrError::Configuration(
                "Character name is missing. Set it with `CHARACTER__NAME`".into(),
            ));
        }

        self.timezone.parse::<Tz>().map_err(|_| {
            ChattrError::Configuration(format!("Unknown timezone '{}'", self.timezone))
        })?;

        Ok(())
    }

    /// Resolved timezone. Validated at load, so UTC is only a fallback for hand-built settings.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(Tz::UTC)
    }

    pub fn session_store_url(&self) -> String {
        self.short_term_memory
            .url
            .clone()
            .unwrap_or_else(|| format!("file://{}", self.directory.base.join("agno").display()))
    }
}

fn environment() -> config::Environment {
    config::Environment::default()
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("mcp.audio_tools")
        .with_list_parse_key("mcp.video_tools")
        .try_parsing(true)
}

fn parse_http_url(key: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ChattrError::Configuration(format!("{key} is not a valid URL ({raw}): {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ChattrError::Configuration(format!(
            "{key} must be http or https, got {other}"
        ))),
    }
}
