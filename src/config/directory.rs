//! Application directory layout.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ChattrError, Result};

/// Root directory plus the derived asset directories.
///
/// Only `base` is configurable (`DIRECTORY__BASE`); everything else hangs off it.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectorySettings {
    #[serde(default = "default_base")]
    pub base: PathBuf,
}

fn default_base() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            base: default_base(),
        }
    }
}

impl DirectorySettings {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn assets(&self) -> PathBuf {
        self.base.join("assets")
    }

    pub fn audio(&self) -> PathBuf {
        self.assets().join("audio")
    }

    pub fn video(&self) -> PathBuf {
        self.assets().join("video")
    }

    pub fn prompts(&self) -> PathBuf {
        self.assets().join("prompts")
    }

    /// Create every directory that does not exist yet.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            self.base.clone(),
            self.assets(),
            self.audio(),
            self.video(),
            self.prompts(),
        ] {
            create_if_missing(&dir)?;
        }
        Ok(())
    }
}

fn create_if_missing(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| {
        tracing::error!(directory = %dir.display(), error = %e, "failed to create directory");
        ChattrError::Configuration(format!(
            "Cannot create directory {}: {e}",
            dir.display()
        ))
    })?;
    tracing::info!(directory = %dir.display(), "created directory");
    Ok(())
}
