//! Folds one turn's agent events into a single evolving assistant message.

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, error};

use crate::agent::AgentEvent;
use crate::error::{ChattrError, BLOCKED_MESSAGE};
use crate::types::{AssistantMessage, ChatTurn, MediaKind, ToolActivity, ToolOutput, ToolStatus, UserMessage};

/// Lifecycle of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnState {
    Idle,
    Streaming,
    Blocked,
    Completed,
    Failed,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Blocked | Self::Completed | Self::Failed)
    }
}

/// The message as of one consumed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: TurnState,
    pub message: AssistantMessage,
}

/// Per-turn state machine: `Idle -> Streaming -> (Blocked | Completed | Failed)`.
///
/// Owns the in-progress message; snapshots are copies. After a terminal
/// state every further event is ignored.
#[derive(Debug, Clone)]
pub struct ResponseAggregator {
    state: TurnState,
    input: UserMessage,
    history: Vec<ChatTurn>,
    message: AssistantMessage,
}

impl ResponseAggregator {
    pub fn new(input: UserMessage, history: Vec<ChatTurn>) -> Self {
        Self {
            state: TurnState::Idle,
            input,
            history,
            message: AssistantMessage::default(),
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn message(&self) -> &AssistantMessage {
        &self.message
    }

    /// Prior turns, plus this one once the turn has completed.
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn into_history(self) -> Vec<ChatTurn> {
        self.history
    }

    /// Fold one event. Returns `None` once the turn has ended.
    pub fn apply(&mut self, event: AgentEvent) -> Option<Snapshot> {
        if self.state.is_terminal() {
            return None;
        }
        match event {
            AgentEvent::ContentFragment { text } => {
                self.state = TurnState::Streaming;
                self.message.text.push_str(&text);
            }
            AgentEvent::ToolStarted { name, arguments } => {
                self.state = TurnState::Streaming;
                self.message.activities.push(ToolActivity {
                    name,
                    status: ToolStatus::Started,
                    detail: render_arguments(&arguments),
                    is_error: false,
                });
            }
            AgentEvent::ToolCompleted { name, output } => {
                self.state = TurnState::Streaming;
                self.complete_tool(name, output);
            }
            AgentEvent::GuardrailRejected { reason } => {
                debug!(reason = %reason, "turn blocked");
                self.state = TurnState::Blocked;
                self.message = AssistantMessage::notice(BLOCKED_MESSAGE);
            }
        }
        Some(self.snapshot())
    }

    /// The event stream ended normally.
    pub fn finish(&mut self) -> Option<Snapshot> {
        if self.state.is_terminal() {
            return None;
        }
        self.state = TurnState::Completed;
        self.history.push(ChatTurn {
            input: self.input.clone(),
            output: self.message.clone(),
        });
        Some(self.snapshot())
    }

    /// The turn failed. A guardrail error is treated as a block.
    pub fn fail(&mut self, err: &ChattrError) -> Option<Snapshot> {
        if self.state.is_terminal() {
            return None;
        }
        if let ChattrError::GuardrailRejection { reason, .. } = err {
            return self.apply(AgentEvent::rejected(reason.clone()));
        }
        match err.collaborator() {
            Some(collaborator) => error!(collaborator = %collaborator, error = %err, "turn failed"),
            None => error!(category = ?err.category(), error = %err, "turn failed"),
        }
        self.state = TurnState::Failed;
        self.message = AssistantMessage::notice(err.user_message());
        Some(self.snapshot())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            message: self.message.clone(),
        }
    }

    /// Oldest unresolved activity with this name wins.
    fn complete_tool(&mut self, name: String, output: ToolOutput) {
        if !output.is_error {
            if let Some(reference) = &output.reference {
                match output.kind {
                    MediaKind::Audio => self.message.audio_ref = Some(reference.clone()),
                    MediaKind::Video => self.message.video_ref = Some(reference.clone()),
                    MediaKind::Other => {}
                }
            }
        }

        let pending = self
            .message
            .activities
            .iter_mut()
            .find(|a| a.name == name && a.status == ToolStatus::Started);
        match pending {
            Some(activity) => {
                activity.status = ToolStatus::Completed;
                activity.detail = Some(output.detail);
                activity.is_error = output.is_error;
            }
            None => self.message.activities.push(ToolActivity {
                name,
                status: ToolStatus::Completed,
                detail: Some(output.detail),
                is_error: output.is_error,
            }),
        }
    }
}

fn render_arguments(arguments: &serde_json::Value) -> Option<String> {
    match arguments {
        serde_json::Value::Null => None,
        serde_json::Value::Object(map) if map.is_empty() => None,
        other => serde_json::to_string_pretty(other).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Collaborator, FAILURE_MESSAGE};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn aggregator() -> ResponseAggregator {
        ResponseAggregator::new(UserMessage::new("Salut"), Vec::new())
    }

    #[test]
    fn starts_idle_and_streams_on_first_event() {
        let mut agg = aggregator();
        assert_eq!(agg.state(), TurnState::Idle);
        let snap = agg.apply(AgentEvent::fragment("Bon")).unwrap();
        assert_eq!(snap.state, TurnState::Streaming);
        assert_eq!(snap.message.text, "Bon");
    }

    #[test]
    fn same_name_completions_match_in_start_order() {
        let mut agg = aggregator();
        agg.apply(AgentEvent::tool_started("tts", json!({"text": "one"})));
        agg.apply(AgentEvent::tool_started("tts", json!({"text": "two"})));
        let snap = agg
            .apply(AgentEvent::tool_completed("tts", ToolOutput::audio("one.wav")))
            .unwrap();

        let activities = &snap.message.activities;
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].status, ToolStatus::Completed);
        assert_eq!(activities[0].detail.as_deref(), Some("one.wav"));
        assert_eq!(activities[1].status, ToolStatus::Started);
        assert!(activities[1].detail.as_deref().unwrap_or("").contains("two"));
    }

    #[test]
    fn completion_without_start_is_recorded() {
        let mut agg = aggregator();
        let snap = agg
            .apply(AgentEvent::tool_completed("search", ToolOutput::other("3 hits")))
            .unwrap();
        assert_eq!(snap.message.activities.len(), 1);
        assert_eq!(snap.message.activities[0].status, ToolStatus::Completed);
        assert_eq!(snap.message.audio_ref, None);
    }

    #[test]
    fn failed_media_tool_leaves_refs_alone() {
        let mut agg = aggregator();
        agg.apply(AgentEvent::tool_completed("tts", ToolOutput::audio("a.wav")));
        let snap = agg
            .apply(AgentEvent::tool_completed("tts", ToolOutput::error("service down")))
            .unwrap();
        assert_eq!(snap.message.audio_ref.as_deref(), Some("a.wav"));
        assert!(snap.message.activities[1].is_error);
    }

    #[test]
    fn rejection_is_terminal_and_hides_reason() {
        let mut agg = aggregator();
        agg.apply(AgentEvent::fragment("partial"));
        let snap = agg
            .apply(AgentEvent::rejected("email address detected"))
            .unwrap();
        assert_eq!(snap.state, TurnState::Blocked);
        assert_eq!(snap.message, AssistantMessage::notice(BLOCKED_MESSAGE));
        assert!(!snap.message.text.contains("email"));

        assert_eq!(agg.apply(AgentEvent::fragment("more")), None);
        assert_eq!(agg.finish(), None);
        assert!(agg.history().is_empty());
    }

    #[test]
    fn failure_shows_generic_notice() {
        let mut agg = aggregator();
        agg.apply(AgentEvent::fragment("Bonjour"));
        let err = ChattrError::upstream_message(Collaborator::Model, "HTTP 500: stack trace");
        let snap = agg.fail(&err).unwrap();
        assert_eq!(snap.state, TurnState::Failed);
        assert_eq!(snap.message.text, FAILURE_MESSAGE);
        assert!(agg.history().is_empty());
        assert_eq!(agg.fail(&err), None);
    }

    #[test]
    fn guardrail_error_counts_as_block() {
        let mut agg = aggregator();
        let err = ChattrError::GuardrailRejection {
            guardrail: "pii".into(),
            reason: "ssn".into(),
        };
        assert_eq!(agg.fail(&err).unwrap().state, TurnState::Blocked);
    }

    #[test]
    fn completion_appends_turn_to_history() {
        let mut agg = aggregator();
        agg.apply(AgentEvent::fragment("Bonjour"));
        let snap = agg.finish().unwrap();
        assert_eq!(snap.state, TurnState::Completed);
        let history = agg.into_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].input.text, "Salut");
        assert_eq!(history[0].output, snap.message);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rejection_is_not_logged_again_at_warn() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut agg = aggregator();
            agg.apply(AgentEvent::rejected("prompt injection detected")).unwrap();
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.is_empty(), "{output}");
    }
}
