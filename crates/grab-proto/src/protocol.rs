//! JSON bodies exchanged with the download backend.
//!
//! | endpoint                         | request                  | response             |
//! |----------------------------------|--------------------------|----------------------|
//! | `POST /api/resolve`              | [`ResolveRequest`]       | [`ResolvePayload`]   |
//! | `GET  /api/scrape?url=`          | query                    | [`ScrapePayload`]    |
//! | `POST /api/download`             | [`DirectDownloadRequest`]| binary               |
//! | `POST /download_start`           | [`DownloadStartRequest`] | [`DownloadStartResponse`] |
//! | `GET  /download_progress/{id}`   |                          | [`ProgressPayload`]  |
//! | `GET  /download_file/{id}`       |                          | binary               |
//! | `GET  /downloads_remaining`      |                          | [`RemainingPayload`] |
//!
//! Every JSON response may instead carry `{ "error": "..." }`.

use serde::{Deserialize, Serialize};

use crate::media::{AudioFormat, JobKind, JobState, Quality};

pub const RESOLVE_PATH: &str = "/api/resolve";
pub const SCRAPE_PATH: &str = "/api/scrape";
pub const DIRECT_DOWNLOAD_PATH: &str = "/api/download";
pub const DOWNLOAD_START_PATH: &str = "/download_start";
pub const DOWNLOAD_PROGRESS_PATH: &str = "/download_progress";
pub const DOWNLOAD_FILE_PATH: &str = "/download_file";
pub const REMAINING_PATH: &str = "/downloads_remaining";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub url: String,
}

/// Metadata as the backend reports it. Everything is optional; defaults are
/// filled in by `media::normalize_resolved`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvePayload {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub artist_image: Option<String>,
    #[serde(default)]
    pub duration_display: Option<String>,
    /// Seconds as a number, or a preformatted string.
    #[serde(default)]
    pub duration: Option<serde_json::Value>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub platform_config: Option<PlatformConfigPayload>,
    #[serde(default, rename = "is_spotify")]
    pub is_music_track: bool,
    #[serde(default)]
    pub best_quality_label: Option<String>,
    #[serde(default)]
    pub worst_quality_label: Option<String>,
    #[serde(default, rename = "spotify_download_url")]
    pub direct_download_url: Option<String>,
    #[serde(default, rename = "spotify_download_url_wav")]
    pub direct_download_url_alt: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub width: Option<u64>,
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub webpage_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfigPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Raw track record from the music provider scrape endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapePayload {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: Option<AlbumRef>,
    /// Track-level images, used when the album carries none.
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub artist_images: Vec<ImageRef>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadStartRequest {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<AudioFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadStartResponse {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressPayload {
    #[serde(default)]
    pub status: JobState,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectDownloadRequest {
    pub track_name: String,
    pub artist_name: String,
    pub duration_ms: u64,
    pub format: AudioFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemainingPayload {
    pub remaining: i64,
}

/// Body of a failed binary request such as `POST /api/download`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: Option<String>,
}
