//! The per-process agent facade.

use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use chrono_tz::Tz;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::{ChattrError, Result};
use crate::guardrail::GuardrailChain;
use crate::knowledge::{format_context, KnowledgeIndex, QdrantIndex};
use crate::mcp::CapabilityRegistry;
use crate::media::{ArtifactStore, MediaRouter};
use crate::memory::{open_session_store, trim_history, validate_session_id, SessionStore};
use crate::provider::{create_embedder, create_provider, ModelProvider};
use crate::tools::ToolHandle;
use crate::types::{ChatTurn, ModelMessage, UserMessage};

use super::events::AgentEvent;
use super::instructions::system_prompt;
use super::runner::ToolLoop;

/// Everything a turn needs, assembled once and shared by every turn.
///
/// Cloning is cheap; clients are behind `Arc`s.
#[derive(Clone, Builder)]
pub struct AgentSession {
    provider: Arc<dyn ModelProvider>,
    #[builder(into)]
    character: String,
    artifacts: ArtifactStore,
    registry: Option<Arc<CapabilityRegistry>>,
    /// Local tools offered alongside the remote ones.
    #[builder(default)]
    tools: Vec<Arc<dyn ToolHandle>>,
    knowledge: Option<Arc<dyn KnowledgeIndex>>,
    sessions: Option<Arc<dyn SessionStore>>,
    #[builder(default = GuardrailChain::standard())]
    guardrails: GuardrailChain,
    #[builder(default)]
    media: MediaRouter,
    #[builder(default = Tz::UTC)]
    timezone: Tz,
    #[builder(default)]
    temperature: f64,
    #[builder(default = 8)]
    max_tool_iterations: usize,
    #[builder(default = 3)]
    knowledge_top_k: usize,
    #[builder(default = Duration::from_secs(86_400))]
    session_ttl: Duration,
    #[builder(default = 20)]
    max_history_turns: usize,
}

impl AgentSession {
    /// Wire every collaborator from settings. No network calls happen here.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let provider = create_provider(&settings.model)?;
        let embedder = create_embedder(&settings.model)?;
        let knowledge: Arc<dyn KnowledgeIndex> =
            Arc::new(QdrantIndex::new(&settings.vector_database, embedder));
        let registry = CapabilityRegistry::load(&settings.mcp.path)?;
        let sessions = open_session_store(&settings.session_store_url())?;

        info!(
            model = %provider.model_id(),
            character = %settings.character.name,
            tool_servers = registry.server_names().len(),
            "agent session ready"
        );

        Ok(Self::builder()
            .provider(provider)
            .character(settings.character.name.clone())
            .artifacts(ArtifactStore::new(&settings.directory))
            .registry(Arc::new(registry))
            .knowledge(knowledge)
            .sessions(sessions)
            .media(MediaRouter::from_settings(&settings.mcp))
            .timezone(settings.tz())
            .temperature(settings.model.temperature)
            .max_tool_iterations(settings.model.max_tool_iterations)
            .knowledge_top_k(settings.vector_database.top_k)
            .session_ttl(Duration::from_secs(settings.short_term_memory.ttl_secs))
            .max_history_turns(settings.short_term_memory.max_turns)
            .build())
    }

    pub fn character(&self) -> &str {
        &self.character
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    pub fn knowledge(&self) -> Option<&Arc<dyn KnowledgeIndex>> {
        self.knowledge.as_ref()
    }

    /// Local tools plus whatever the tool services currently offer.
    pub async fn tool_handles(&self) -> Vec<Arc<dyn ToolHandle>> {
        let mut handles = self.tools.clone();
        if let Some(registry) = &self.registry {
            handles.extend(registry.capabilities().await);
        }
        handles
    }

    /// History for a turn: the caller's, or the stored one when the caller
    /// has none and names a session.
    pub async fn history(
        &self,
        session_id: Option<&str>,
        supplied: Vec<ChatTurn>,
    ) -> Result<Vec<ChatTurn>> {
        let (Some(id), Some(store)) = (session_id, &self.sessions) else {
            return Ok(supplied);
        };
        validate_session_id(id)?;
        if !supplied.is_empty() {
            return Ok(supplied);
        }
        let stored = store.get(id).await?.unwrap_or_default();
        debug!(session_id = %id, turns = stored.len(), "loaded session history");
        Ok(stored)
    }

    /// Persist a finished history. Failures are logged, never surfaced.
    pub async fn remember(&self, session_id: &str, history: &[ChatTurn]) {
        let Some(store) = &self.sessions else {
            return;
        };
        let mut turns = history.to_vec();
        trim_history(&mut turns, self.max_history_turns);
        if let Err(e) = store.set(session_id, &turns, self.session_ttl).await {
            error!(session_id = %session_id, error = %e, "failed to save session history");
        }
    }

    /// Run one turn. The stream is lazy; dropping it abandons the turn.
    pub fn handle(
        &self,
        message: UserMessage,
        history: Vec<ChatTurn>,
    ) -> BoxStream<'static, Result<AgentEvent>> {
        let this = self.clone();

        let stream = async_stream::stream! {
            if message.text.trim().is_empty() && message.attachments.is_empty() {
                yield Err(ChattrError::Validation("Message is empty".into()));
                return;
            }

            match this.guardrails.check(&message) {
                Ok(()) => {}
                Err(ChattrError::GuardrailRejection { reason, .. }) => {
                    yield Ok(AgentEvent::rejected(reason));
                    return;
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }

            let tools = this.tool_handles().await;
            let context = this.knowledge_context(&message.text).await;
            let messages = this.build_messages(&message, &history, &tools, context.as_deref());

            let mut events = ToolLoop::new(
                this.provider.clone(),
                tools,
                this.media.clone(),
                this.artifacts.clone(),
            )
            .with_temperature(this.temperature)
            .with_max_iterations(this.max_tool_iterations)
            .run(messages);

            while let Some(event) = events.next().await {
                yield event;
            }
        };

        Box::pin(stream)
    }

    /// Shut down tool service sessions.
    pub async fn close(&self) {
        if let Some(registry) = &self.registry {
            registry.close().await;
        }
    }

    async fn knowledge_context(&self, query: &str) -> Option<String> {
        let index = self.knowledge.as_ref()?;
        if query.trim().is_empty() {
            return None;
        }
        match index.search(query, self.knowledge_top_k).await {
            Ok(hits) => {
                debug!(hits = hits.len(), "knowledge search complete");
                format_context(&hits)
            }
            Err(e) => {
                warn!(collaborator = ?e.collaborator(), error = %e, "knowledge search failed; continuing without context");
                None
            }
        }
    }

    fn build_messages(
        &self,
        message: &UserMessage,
        history: &[ChatTurn],
        tools: &[Arc<dyn ToolHandle>],
        context: Option<&str>,
    ) -> Vec<ModelMessage> {
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        let system = system_prompt(
            &self.character,
            self.media.has_audio_tool(names.iter().copied()),
            self.media.has_video_tool(names.iter().copied()),
            chrono::Utc::now().with_timezone(&self.timezone),
            context,
        );

        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ModelMessage::system(system));
        for turn in history {
            messages.push(ModelMessage::user(user_content(&turn.input)));
            messages.push(ModelMessage::assistant(turn.output.text.clone()));
        }
        messages.push(ModelMessage::user(user_content(message)));
        messages
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("model", &self.provider.model_id())
            .field("character", &self.character)
            .field("guardrails", &self.guardrails)
            .finish_non_exhaustive()
    }
}

/// Attachments reach the model as path references after the text.
fn user_content(message: &UserMessage) -> String {
    if message.attachments.is_empty() {
        return message.text.clone();
    }
    let mut content = message.text.clone();
    content.push_str("\n\nAttached files:");
    for path in &message.attachments {
        content.push_str(&format!("\n- {}", path.display()));
    }
    content
}
