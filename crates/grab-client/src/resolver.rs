//! URL → media metadata.

use async_trait::async_trait;
use grab_proto::config::{Config, MusicPath};
use grab_proto::media::{
    normalize_resolved, normalize_scrape, MediaKind, MediaReference, ResolvedMetadata,
};
use grab_proto::protocol::{
    ResolvePayload, ResolveRequest, ScrapePayload, RESOLVE_PATH, SCRAPE_PATH,
};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::ResolveError;
use crate::http::{endpoint, read_json, JsonReply};

#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve one URL. Stateless: calling again re-queries upstream.
    async fn resolve(&self, url: &str) -> Result<ResolvedMetadata, ResolveError>;
}

/// Resolver backed by the download service's HTTP API.
#[derive(Clone)]
pub struct HttpResolver {
    client: Client,
    base_url: String,
    music_path: MusicPath,
}

impl HttpResolver {
    pub fn new(client: Client, base_url: impl Into<String>, music_path: MusicPath) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            music_path,
        }
    }

    pub fn from_config(client: Client, config: &Config) -> Self {
        Self::new(client, config.api.base_url.clone(), config.resolver.music_path)
    }

    async fn resolve_generic(&self, url: &str) -> Result<ResolvedMetadata, ResolveError> {
        let response = self
            .client
            .post(endpoint(&self.base_url, RESOLVE_PATH))
            .json(&ResolveRequest { url: url.to_string() })
            .send()
            .await
            .map_err(|e| {
                warn!("resolve: request failed: {}", e);
                ResolveError::Network
            })?;

        let reply: JsonReply<ResolvePayload> = read_json(response).await.map_err(|e| {
            warn!("resolve: reading body failed: {}", e);
            ResolveError::Network
        })?;

        // An explicit error wins over the status code, so 4xx bodies like
        // {"error": "Video unavailable"} are shown as-is.
        let payload = match reply.body {
            Some(p) => p,
            None if !reply.status.is_success() => {
                return Err(ResolveError::Status(reply.status.as_u16()))
            }
            None => return Err(ResolveError::Malformed),
        };
        if let Some(err) = payload.error.clone() {
            return Err(ResolveError::Upstream(err));
        }
        if !reply.status.is_success() {
            return Err(ResolveError::Status(reply.status.as_u16()));
        }

        Ok(normalize_resolved(payload, url, &self.base_url))
    }

    async fn resolve_music_backend(&self, url: &str) -> Result<ResolvedMetadata, ResolveError> {
        let response = self
            .client
            .post(endpoint(&self.base_url, RESOLVE_PATH))
            .json(&ResolveRequest { url: url.to_string() })
            .send()
            .await
            .map_err(|e| {
                warn!("resolve(music): request failed: {}", e);
                ResolveError::MusicNetwork
            })?;

        if !response.status().is_success() {
            return Err(ResolveError::Status(response.status().as_u16()));
        }

        let reply: JsonReply<ResolvePayload> = read_json(response)
            .await
            .map_err(|_| ResolveError::MusicNetwork)?;
        let payload = reply.body.ok_or(ResolveError::Malformed)?;
        if let Some(err) = payload.error.clone() {
            return Err(ResolveError::Upstream(err));
        }

        Ok(normalize_resolved(payload, url, &self.base_url))
    }

    async fn resolve_music_scrape(&self, url: &str) -> Result<ResolvedMetadata, ResolveError> {
        let response = self
            .client
            .get(endpoint(&self.base_url, SCRAPE_PATH))
            .query(&[("url", url)])
            .send()
            .await
            .map_err(|e| {
                warn!("scrape: request failed: {}", e);
                ResolveError::MusicNetwork
            })?;

        if !response.status().is_success() {
            return Err(ResolveError::Status(response.status().as_u16()));
        }

        let reply: JsonReply<ScrapePayload> = read_json(response)
            .await
            .map_err(|_| ResolveError::MusicNetwork)?;
        let payload = reply.body.ok_or(ResolveError::Malformed)?;
        if let Some(err) = payload.error.clone() {
            return Err(ResolveError::Upstream(err));
        }

        Ok(normalize_scrape(payload, url))
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    async fn resolve(&self, url: &str) -> Result<ResolvedMetadata, ResolveError> {
        if url.trim().is_empty() {
            return Err(ResolveError::EmptyUrl);
        }
        let reference = MediaReference::classify(url);
        info!("resolve: {} ({:?})", reference.url(), reference.kind());

        let result = match (reference.kind(), self.music_path) {
            (MediaKind::Generic, _) => self.resolve_generic(reference.url()).await,
            (MediaKind::Music, MusicPath::Backend) => {
                self.resolve_music_backend(reference.url()).await
            }
            (MediaKind::Music, MusicPath::Scrape) => {
                self.resolve_music_scrape(reference.url()).await
            }
        };

        match &result {
            Ok(meta) => debug!("resolve: got '{}' by '{}'", meta.title, meta.uploader_name),
            Err(e) => info!("resolve: failed: {}", e),
        }
        result
    }
}
