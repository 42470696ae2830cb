//! Job runners: the two backend contracts behind one trait.
//!
//! * [`PollingRunner`]: `POST /download_start` returns a task id, then
//!   `GET /download_progress/{id}` reports status until a terminal state.
//! * [`DirectRunner`]: music tracks come back as one binary response from
//!   `POST /api/download`; there is nothing to poll, so the controller
//!   simulates progress. Other job kinds are forwarded to a polling runner.

use std::sync::Arc;

use async_trait::async_trait;
use grab_proto::config::Config;
use grab_proto::media::{DownloadJob, JobKind, JobStatus, Quality};
use grab_proto::protocol::{
    DirectDownloadRequest, DownloadStartRequest, DownloadStartResponse, ErrorPayload,
    ProgressPayload, DIRECT_DOWNLOAD_PATH, DOWNLOAD_PROGRESS_PATH, DOWNLOAD_START_PATH,
};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::RunnerError;
use crate::http::{endpoint, read_json, JsonReply};

#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Whether jobs of `kind` report status by id. When false the job is
    /// fetched in one go with [`JobRunner::fetch_artifact`].
    fn supports_progress_polling(&self, kind: JobKind) -> bool;

    /// Start a server-side job and return its task id.
    async fn start(&self, job: &DownloadJob) -> Result<String, RunnerError>;

    /// Current status of a started task.
    async fn status(&self, task_id: &str) -> Result<JobStatus, RunnerError>;

    /// Fetch the finished artifact in a single request.
    async fn fetch_artifact(&self, job: &DownloadJob) -> Result<Vec<u8>, RunnerError>;
}

// ── PollingRunner ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PollingRunner {
    client: Client,
    base_url: String,
}

impl PollingRunner {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

/// Body for `/download_start`. Video and audio jobs default to best quality.
pub fn start_request(job: &DownloadJob) -> DownloadStartRequest {
    let track = job.track.as_ref().filter(|_| job.kind == JobKind::Music);
    DownloadStartRequest {
        url: job.source_url.clone(),
        kind: job.kind,
        quality: match job.kind {
            JobKind::Music => None,
            _ => Some(job.quality.unwrap_or(Quality::Best)),
        },
        format: job.format,
        track_title: track.map(|t| t.title.clone()),
        track_artist: track.map(|t| t.artist.clone()),
        duration_ms: track.map(|t| t.duration_ms),
    }
}

#[async_trait]
impl JobRunner for PollingRunner {
    fn supports_progress_polling(&self, _kind: JobKind) -> bool {
        true
    }

    async fn start(&self, job: &DownloadJob) -> Result<String, RunnerError> {
        let body = start_request(job);
        info!("download_start: job={} type={:?}", job.id, job.kind);

        let response = self
            .client
            .post(endpoint(&self.base_url, DOWNLOAD_START_PATH))
            .json(&body)
            .send()
            .await?;
        let reply: JsonReply<DownloadStartResponse> = read_json(response).await?;

        match reply.body {
            Some(DownloadStartResponse {
                error: Some(err), ..
            }) => Err(RunnerError::Upstream(err)),
            Some(DownloadStartResponse {
                task_id: Some(id), ..
            }) if reply.status.is_success() => {
                info!("download_start: job={} task_id={}", job.id, id);
                Ok(id)
            }
            _ if !reply.status.is_success() => Err(RunnerError::Status(reply.status.as_u16())),
            _ => Err(RunnerError::Malformed),
        }
    }

    async fn status(&self, task_id: &str) -> Result<JobStatus, RunnerError> {
        let url = endpoint(
            &self.base_url,
            &format!("{}/{}", DOWNLOAD_PROGRESS_PATH, task_id),
        );
        let response = self.client.get(url).send().await?;
        let reply: JsonReply<ProgressPayload> = read_json(response).await?;

        if !reply.status.is_success() {
            return Err(RunnerError::Status(reply.status.as_u16()));
        }
        let payload = reply.body.ok_or(RunnerError::Malformed)?;
        debug!(
            "download_progress: task={} status={:?} progress={}",
            task_id, payload.status, payload.progress
        );
        Ok(payload.into())
    }

    async fn fetch_artifact(&self, _job: &DownloadJob) -> Result<Vec<u8>, RunnerError> {
        Err(RunnerError::Unsupported)
    }
}

// ── DirectRunner ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DirectRunner {
    inner: PollingRunner,
}

impl DirectRunner {
    pub fn new(inner: PollingRunner) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl JobRunner for DirectRunner {
    fn supports_progress_polling(&self, kind: JobKind) -> bool {
        kind != JobKind::Music
    }

    async fn start(&self, job: &DownloadJob) -> Result<String, RunnerError> {
        self.inner.start(job).await
    }

    async fn status(&self, task_id: &str) -> Result<JobStatus, RunnerError> {
        self.inner.status(task_id).await
    }

    async fn fetch_artifact(&self, job: &DownloadJob) -> Result<Vec<u8>, RunnerError> {
        let track = job
            .track
            .as_ref()
            .filter(|t| t.is_complete())
            .ok_or(RunnerError::Unsupported)?;
        let body = DirectDownloadRequest {
            track_name: track.title.clone(),
            artist_name: track.artist.clone(),
            duration_ms: track.duration_ms,
            format: job.format_or_default(),
        };
        info!(
            "direct download: job={} '{}' by '{}' as {:?}",
            job.id, body.track_name, body.artist_name, body.format
        );

        let response = self
            .inner
            .client
            .post(endpoint(&self.inner.base_url, DIRECT_DOWNLOAD_PATH))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reply: JsonReply<ErrorPayload> = read_json(response).await?;
            warn!("direct download: job={} failed with {}", job.id, status);
            return Err(match reply.body.and_then(|b| b.error) {
                Some(msg) => RunnerError::Upstream(msg),
                None => RunnerError::Status(status.as_u16()),
            });
        }

        let bytes = response.bytes().await?.to_vec();
        info!("direct download: job={} got {} bytes", job.id, bytes.len());
        Ok(bytes)
    }
}

/// Pick the runner the config asks for.
pub fn runner_from_config(client: Client, config: &Config) -> Arc<dyn JobRunner> {
    let polling = PollingRunner::new(client, config.api.base_url.clone());
    if config.runner.music_progress_polling {
        Arc::new(polling)
    } else {
        Arc::new(DirectRunner::new(polling))
    }
}
