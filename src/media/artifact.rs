//! Local copies of media artifacts produced by remote tools.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::DirectorySettings;
use crate::error::{ChattrError, Collaborator, Result};
use crate::provider::http::{shared_client, status_to_error};
use crate::types::MediaKind;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns media references into something the UI can play.
///
/// Remote URLs are downloaded into the audio/video asset directories; local
/// paths pass through untouched.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    audio_dir: PathBuf,
    video_dir: PathBuf,
    timeout: Duration,
}

impl ArtifactStore {
    pub fn new(directories: &DirectorySettings) -> Self {
        Self {
            audio_dir: directories.audio(),
            video_dir: directories.video(),
            timeout: DOWNLOAD_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve `reference` to a playable location.
    ///
    /// A failed download is logged and the original URL is returned, so a
    /// turn never fails because of it.
    pub async fn materialize(&self, kind: MediaKind, reference: &str) -> String {
        if kind == MediaKind::Other {
            return reference.to_string();
        }
        if let Some(path) = reference.strip_prefix("file://") {
            return path.to_string();
        }
        if !is_remote(reference) {
            return reference.to_string();
        }
        match self.download(kind, reference).await {
            Ok(path) => path.display().to_string(),
            Err(e) => {
                warn!(url = %reference, error = %e, "artifact download failed; keeping remote reference");
                reference.to_string()
            }
        }
    }

    async fn download(&self, kind: MediaKind, url: &str) -> Result<PathBuf> {
        let source = if is_playlist(url) {
            self.first_segment(url).await?
        } else {
            url.to_string()
        };

        let dir = match kind {
            MediaKind::Audio => &self.audio_dir,
            _ => &self.video_dir,
        };
        let target = dir.join(artifact_file_name(url, &source));
        if target.is_file() {
            debug!(path = %target.display(), "artifact already downloaded");
            return Ok(target);
        }

        let resp = shared_client()
            .get(&source)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ChattrError::upstream(Collaborator::ArtifactDownload, e))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(status_to_error(Collaborator::ArtifactDownload, status, &body));
        }

        tokio::fs::create_dir_all(dir).await?;
        let partial = partial_path(&target);
        if let Err(e) = write_body(resp, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        tokio::fs::rename(&partial, &target).await?;
        debug!(url = %source, path = %target.display(), "artifact downloaded");
        Ok(target)
    }

    /// Resolve an HLS playlist to its first media segment.
    async fn first_segment(&self, playlist_url: &str) -> Result<String> {
        let resp = shared_client()
            .get(playlist_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ChattrError::upstream(Collaborator::ArtifactDownload, e))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(status_to_error(Collaborator::ArtifactDownload, status, &body));
        }
        let playlist = resp
            .text()
            .await
            .map_err(|e| ChattrError::upstream(Collaborator::ArtifactDownload, e))?;
        let segment = first_playlist_entry(&playlist).ok_or_else(|| {
            ChattrError::upstream_message(Collaborator::ArtifactDownload, "playlist has no segments")
        })?;

        let base = reqwest::Url::parse(playlist_url)
            .map_err(|e| ChattrError::upstream(Collaborator::ArtifactDownload, e))?;
        let resolved = base
            .join(segment)
            .map_err(|e| ChattrError::upstream(Collaborator::ArtifactDownload, e))?;
        Ok(resolved.to_string())
    }
}

async fn write_body(resp: reqwest::Response, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| ChattrError::upstream(Collaborator::ArtifactDownload, e))?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

fn is_remote(reference: &str) -> bool {
    reqwest::Url::parse(reference)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

fn is_playlist(url: &str) -> bool {
    url_path(url).ends_with(".m3u8")
}

fn url_path(url: &str) -> String {
    reqwest::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

fn first_playlist_entry(playlist: &str) -> Option<&str> {
    playlist
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Stable name: hash of the original URL plus the extension of what was fetched.
fn artifact_file_name(original: &str, source: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(original.as_bytes()));
    let path = url_path(source);
    let ext = Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5)
        .unwrap_or("bin");
    format!("{}.{ext}", &digest[..16])
}

/// Download target for one in-flight fetch of `target`.
fn partial_path(target: &Path) -> PathBuf {
    target.with_extension(format!("{}.part", uuid::Uuid::new_v4().simple()))
}
