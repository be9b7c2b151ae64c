//! JSON-file session store: one file per session under a directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{validate_session_id, SessionRecord, SessionStore};
use crate::error::{ChattrError, Collaborator, Result};
use crate::types::ChatTurn;

pub struct JsonFileSessionStore {
    dir: PathBuf,
}

impl JsonFileSessionStore {
    /// Create the store, making the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            ChattrError::Configuration(format!(
                "Cannot create session directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }
}

fn store_error(e: impl std::error::Error + Send + Sync + 'static) -> ChattrError {
    ChattrError::upstream(Collaborator::SessionStore, e)
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Vec<ChatTurn>>> {
        validate_session_id(session_id)?;
        let path = self.path(session_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_error(e)),
        };
        let record: SessionRecord = serde_json::from_slice(&raw).map_err(store_error)?;
        if record.is_expired(Utc::now()) {
            debug!(session_id, "session expired");
            self.expire(session_id).await?;
            return Ok(None);
        }
        Ok(Some(record.turns))
    }

    async fn set(&self, session_id: &str, turns: &[ChatTurn], ttl: Duration) -> Result<()> {
        validate_session_id(session_id)?;
        let record = SessionRecord::new(turns, ttl);
        let bytes = serde_json::to_vec_pretty(&record).map_err(store_error)?;

        let path = self.path(session_id);
        let tmp = temp_path(&path);
        tokio::fs::write(&tmp, bytes).await.map_err(store_error)?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(store_error(e));
        }
        Ok(())
    }

    async fn expire(&self, session_id: &str) -> Result<()> {
        validate_session_id(session_id)?;
        match tokio::fs::remove_file(self.path(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_error(e)),
        }
    }
}

/// A sibling of `path` private to one write.
fn temp_path(path: &Path) -> PathBuf {
    path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()))
}
