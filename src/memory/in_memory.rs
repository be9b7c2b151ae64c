//! Process-local session store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{validate_session_id, SessionRecord, SessionStore};
use crate::error::Result;
use crate::types::ChatTurn;

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Vec<ChatTurn>>> {
        validate_session_id(session_id)?;
        let mut sessions = self.sessions.lock().await;
        match sessions.get(session_id) {
            Some(record) if record.is_expired(Utc::now()) => {
                sessions.remove(session_id);
                Ok(None)
            }
            Some(record) => Ok(Some(record.turns.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, session_id: &str, turns: &[ChatTurn], ttl: Duration) -> Result<()> {
        validate_session_id(session_id)?;
        let mut sessions = self.sessions.lock().await;
        let now = Utc::now();
        sessions.retain(|_, record| !record.is_expired(now));
        sessions.insert(session_id.to_string(), SessionRecord::new(turns, ttl));
        Ok(())
    }

    async fn expire(&self, session_id: &str) -> Result<()> {
        validate_session_id(session_id)?;
        self.sessions.lock().await.remove(session_id);
        Ok(())
    }
}
