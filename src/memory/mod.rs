//! Per-session conversation store (get/set/expire by session key).

pub mod file;
pub mod in_memory;

pub use file::JsonFileSessionStore;
pub use in_memory::InMemorySessionStore;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ChattrError, Result};
use crate::types::ChatTurn;

/// Key-value store of conversation history.
///
/// Implementations own their consistency; callers add no locking.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stored turns, or `None` if the session is unknown or expired.
    async fn get(&self, session_id: &str) -> Result<Option<Vec<ChatTurn>>>;

    async fn set(&self, session_id: &str, turns: &[ChatTurn], ttl: Duration) -> Result<()>;

    /// Drop the session now.
    async fn expire(&self, session_id: &str) -> Result<()>;
}

/// What a store keeps per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub expires_at: DateTime<Utc>,
    pub turns: Vec<ChatTurn>,
}

impl SessionRecord {
    pub fn new(turns: &[ChatTurn], ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            expires_at: Utc::now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            turns: turns.to_vec(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session ids become file names, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= 128
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ChattrError::Validation(format!(
            "Invalid session id '{session_id}'"
        )))
    }
}

/// Keep only the most recent `max_turns` turns.
pub fn trim_history(turns: &mut Vec<ChatTurn>, max_turns: usize) {
    if turns.len() > max_turns {
        turns.drain(..turns.len() - max_turns);
    }
}

/// Open the store named by a `file://<dir>` or `memory://` URL.
pub fn open_session_store(url: &str) -> Result<Arc<dyn SessionStore>> {
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(Arc::new(JsonFileSessionStore::new(PathBuf::from(path))?));
    }
    if url.starts_with("memory://") {
        return Ok(Arc::new(InMemorySessionStore::new()));
    }
    Err(ChattrError::Configuration(format!(
        "Unsupported session store URL: {url}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssistantMessage, UserMessage};

    fn turn(text: &str) -> ChatTurn {
        ChatTurn {
            input: UserMessage::new(text),
            output: AssistantMessage::notice(format!("re: {text}")),
        }
    }

    #[test]
    fn trim_keeps_latest_turns() {
        let mut turns = vec![turn("a"), turn("b"), turn("c")];
        trim_history(&mut turns, 2);
        assert_eq!(turns, vec![turn("b"), turn("c")]);
    }

    #[test]
    fn session_ids_are_restricted() {
        assert!(validate_session_id("abc-123_X").is_ok());
        assert!(validate_session_id("../etc/passwd").is_err());
        assert!(validate_session_id("").is_err());
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(matches!(
            open_session_store("redis://localhost"),
            Err(ChattrError::Configuration(_))
        ));
        assert!(open_session_store("memory://").is_ok());
    }

    #[test]
    fn zero_ttl_record_is_expired() {
        let record = SessionRecord::new(&[turn("a")], Duration::ZERO);
        assert!(record.is_expired(Utc::now()));
    }
}
