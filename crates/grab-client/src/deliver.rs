//! Artifact delivery: writing finished downloads into the downloads dir.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use grab_proto::media::sanitize_filename_component;
use grab_proto::protocol::DOWNLOAD_FILE_PATH;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::DeliveryError;
use crate::http::endpoint;

#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Download `/download_file/{task_id}` and store it.
    async fn save_task_file(&self, task_id: &str) -> Result<PathBuf, DeliveryError>;

    /// Store bytes that were already fetched.
    async fn save_blob(&self, bytes: Vec<u8>, filename: &str) -> Result<PathBuf, DeliveryError>;
}

/// Writes artifacts into one directory, created on demand. Existing files
/// are never overwritten; a ` (n)` suffix is added instead.
#[derive(Clone)]
pub struct DirSink {
    client: Client,
    base_url: String,
    dir: PathBuf,
}

impl DirSink {
    pub fn new(client: Client, base_url: impl Into<String>, dir: PathBuf) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            dir,
        }
    }
}

#[async_trait]
impl ArtifactSink for DirSink {
    async fn save_task_file(&self, task_id: &str) -> Result<PathBuf, DeliveryError> {
        let url = endpoint(&self.base_url, &format!("{}/{}", DOWNLOAD_FILE_PATH, task_id));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(DeliveryError::Network)?;

        if !response.status().is_success() {
            warn!("deliver: {} returned {}", url, response.status());
            return Err(DeliveryError::Status(response.status().as_u16()));
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| format!("{}.bin", sanitize_filename_component(task_id)));

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = unique_path(&self.dir, &filename);
        let part = PartFile::new(&path);
        let mut file = tokio::fs::File::create(part.path()).await?;

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(DeliveryError::Network)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);
        part.commit().await?;

        info!("deliver: task {} → {} ({} bytes)", task_id, path.display(), written);
        Ok(path)
    }

    async fn save_blob(&self, bytes: Vec<u8>, filename: &str) -> Result<PathBuf, DeliveryError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = unique_path(&self.dir, filename);
        let part = PartFile::new(&path);
        tokio::fs::write(part.path(), &bytes).await?;
        part.commit().await?;
        info!("deliver: {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// A `<name>.part` file that becomes `<name>` on [`PartFile::commit`].
/// Dropped before that (error, cancellation), it is removed, so a partial
/// artifact never sits under its final name.
struct PartFile {
    part: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PartFile {
    fn new(target: &Path) -> Self {
        let mut part = target.as_os_str().to_owned();
        part.push(".part");
        Self {
            part: PathBuf::from(part),
            target: target.to_path_buf(),
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.part
    }

    async fn commit(mut self) -> std::io::Result<()> {
        tokio::fs::rename(&self.part, &self.target).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.part) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("deliver: could not remove {}: {}", self.part.display(), e);
                }
            } else {
                debug!("deliver: discarded {}", self.part.display());
            }
        }
    }
}

/// Extract and sanitize the filename from a `Content-Disposition` value.
/// The extension keeps its dot; everything else follows the usual
/// `[A-Za-z0-9 _-]` rule.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let raw = header.split(';').map(str::trim).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| value.trim().trim_matches('"').to_string())
    })?;

    let (stem, ext) = match raw.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() => (s, Some(e)),
        _ => (raw.as_str(), None),
    };
    let stem = sanitize_filename_component(stem);
    if stem.trim().is_empty() {
        return None;
    }
    let ext = ext
        .map(sanitize_filename_component)
        .filter(|e| !e.is_empty());
    Some(match ext {
        Some(e) => format!("{}.{}", stem.trim(), e),
        None => stem.trim().to_string(),
    })
}

/// `dir/name`, or `dir/name (n).ext` for the first free `n`.
pub fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() => (s.to_string(), format!(".{}", e)),
        _ => (filename.to_string(), String::new()),
    };
    (1..)
        .map(|n| dir.join(format!("{} ({}){}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
