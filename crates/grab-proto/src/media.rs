//! Media references, resolved metadata and download jobs, plus the pure
//! helpers that normalize backend records into them.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::protocol::{ImageRef, ProgressPayload, ResolvePayload, ScrapePayload};

pub const UNKNOWN_TRACK: &str = "Unknown Track";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_UPLOADER: &str = "Unknown";

const MUSIC_URL_PATTERN: &str = r"(?i)spotify\.com|open\.spotify";

static MUSIC_URL_RE: OnceLock<Regex> = OnceLock::new();

// ── References ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Generic,
    Music,
}

/// A submitted URL and the resolution path it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    url: String,
    kind: MediaKind,
}

impl MediaReference {
    /// Classify `url` once; the result never changes afterwards.
    pub fn classify(url: &str) -> Self {
        let url = url.trim().to_string();
        let kind = if is_music_url(&url) {
            MediaKind::Music
        } else {
            MediaKind::Generic
        };
        Self { url, kind }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

/// Check if URL points at the music-streaming provider
pub fn is_music_url(url: &str) -> bool {
    MUSIC_URL_RE
        .get_or_init(|| Regex::new(MUSIC_URL_PATTERN).expect("music URL pattern is valid"))
        .is_match(url)
}

// ── Resolved metadata ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadHints {
    pub best_quality_label: Option<String>,
    pub worst_quality_label: Option<String>,
    pub direct_download_url: Option<String>,
    pub direct_download_url_alt: Option<String>,
}

/// Track identity needed to start a music job. Fields hold the raw values
/// (possibly empty), not the display sentinels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
}

impl TrackInfo {
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.artist.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMetadata {
    pub source_url: String,
    pub title: String,
    pub uploader_name: String,
    pub thumbnail_url: Option<String>,
    pub artist_image_url: Option<String>,
    pub duration_display: Option<String>,
    pub duration_ms: u64,
    pub platform_id: String,
    pub platform_config: PlatformConfig,
    pub is_music_track: bool,
    pub download_hints: DownloadHints,
    pub view_count: Option<u64>,
    pub is_portrait: bool,
    pub track: Option<TrackInfo>,
}

impl ResolvedMetadata {
    /// Format choices offered on the result card, in display order.
    pub fn download_options(&self) -> Vec<DownloadOption> {
        if self.is_music_track {
            vec![
                DownloadOption::Music(AudioFormat::Mp3),
                DownloadOption::Music(AudioFormat::Wav),
            ]
        } else {
            vec![
                DownloadOption::Video(Quality::Best),
                DownloadOption::Video(Quality::Worst),
                DownloadOption::Audio(AudioFormat::Mp3),
                DownloadOption::Audio(AudioFormat::Wav),
            ]
        }
    }

    /// Card label for an option, using the backend's quality hints.
    pub fn option_label(&self, option: DownloadOption) -> String {
        match option {
            DownloadOption::Video(Quality::Best) => format!(
                "Highest Quality ({})",
                self.download_hints.best_quality_label.as_deref().unwrap_or("HD")
            ),
            DownloadOption::Video(Quality::Worst) => format!(
                "Lowest Quality ({})",
                self.download_hints.worst_quality_label.as_deref().unwrap_or("SD")
            ),
            DownloadOption::Audio(format) | DownloadOption::Music(format) => {
                format!("{} Format (.{})", format.label(), format.extension())
            }
        }
    }

    /// Build the job for a picked option.
    pub fn job_for(&self, id: impl Into<String>, option: DownloadOption) -> DownloadJob {
        let (kind, quality, format) = match option {
            DownloadOption::Video(q) => (JobKind::Video, Some(q), None),
            DownloadOption::Audio(f) => (JobKind::Audio, Some(Quality::Best), Some(f)),
            DownloadOption::Music(f) => (JobKind::Music, None, Some(f)),
        };
        DownloadJob {
            id: id.into(),
            source_url: self.source_url.clone(),
            kind,
            format,
            quality,
            track: if kind == JobKind::Music {
                Some(self.track.clone().unwrap_or_default())
            } else {
                None
            },
        }
    }
}

/// Normalize a `/api/resolve` record. Relative `/proxy_image` URLs are
/// rewritten against `api_base`.
pub fn normalize_resolved(
    payload: ResolvePayload,
    source_url: &str,
    api_base: &str,
) -> ResolvedMetadata {
    let platform_id = payload
        .platform
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "youtube".to_string());
    let platform_cfg = payload.platform_config.clone().unwrap_or_default();
    let platform_config = PlatformConfig {
        name: platform_cfg.name.unwrap_or_else(|| "Video".to_string()),
        color: platform_cfg.color.unwrap_or_else(|| "#FF0000".to_string()),
    };

    let raw_uploader = payload
        .uploader
        .clone()
        .or_else(|| payload.channel.clone())
        .unwrap_or_default();
    let raw_title = payload.title.clone().unwrap_or_default();

    let duration_display = payload
        .duration_display
        .clone()
        .filter(|d| !d.is_empty())
        .or_else(|| payload.duration.as_ref().and_then(duration_value_display))
        .or_else(|| payload.duration_ms.filter(|ms| *ms > 0).map(format_duration_ms));

    let is_short = platform_id == "youtube"
        && (source_url.to_lowercase().contains("youtube.com/shorts/")
            || payload
                .webpage_url
                .as_deref()
                .map(|u| u.contains("/shorts/"))
                .unwrap_or(false));
    let portrait_by_size = matches!(
        (payload.width, payload.height),
        (Some(w), Some(h)) if w > 0 && h > w
    );
    let is_portrait =
        matches!(platform_id.as_str(), "tiktok" | "instagram") || is_short || portrait_by_size;

    let track = payload.is_music_track.then(|| TrackInfo {
        title: raw_title.clone(),
        artist: raw_uploader.clone(),
        duration_ms: payload.duration_ms.unwrap_or(0),
    });

    ResolvedMetadata {
        source_url: source_url.to_string(),
        title: non_empty_or(raw_title, UNKNOWN_TITLE),
        uploader_name: non_empty_or(raw_uploader, UNKNOWN_UPLOADER),
        thumbnail_url: payload.thumbnail.map(|u| absolutize(&u, api_base)),
        artist_image_url: payload.artist_image.map(|u| absolutize(&u, api_base)),
        duration_display,
        duration_ms: payload.duration_ms.unwrap_or(0),
        platform_id,
        platform_config,
        is_music_track: payload.is_music_track,
        download_hints: DownloadHints {
            best_quality_label: payload.best_quality_label,
            worst_quality_label: payload.worst_quality_label,
            direct_download_url: payload.direct_download_url,
            direct_download_url_alt: payload.direct_download_url_alt,
        },
        view_count: payload.view_count,
        is_portrait,
        track,
    }
}

/// Normalize a raw provider record from `/api/scrape`.
pub fn normalize_scrape(payload: ScrapePayload, source_url: &str) -> ResolvedMetadata {
    let raw_title = payload.name.clone().unwrap_or_default();
    let raw_artist = payload
        .artists
        .iter()
        .filter_map(|a| a.name.as_deref())
        .filter(|n| !n.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let duration_ms = payload.duration_ms.unwrap_or(0);

    let cover_candidates = match &payload.album {
        Some(album) if !album.images.is_empty() => &album.images,
        _ => &payload.images,
    };

    ResolvedMetadata {
        source_url: source_url.to_string(),
        title: non_empty_or(raw_title.clone(), UNKNOWN_TRACK),
        uploader_name: non_empty_or(raw_artist.clone(), UNKNOWN_ARTIST),
        thumbnail_url: pick_largest_image(cover_candidates).map(|i| i.url.clone()),
        artist_image_url: pick_largest_image(&payload.artist_images).map(|i| i.url.clone()),
        duration_display: Some(format_duration_ms(duration_ms)),
        duration_ms,
        platform_id: "spotify".to_string(),
        platform_config: PlatformConfig {
            name: "Spotify".to_string(),
            color: "#1DB954".to_string(),
        },
        is_music_track: true,
        download_hints: DownloadHints::default(),
        view_count: None,
        is_portrait: false,
        track: Some(TrackInfo {
            title: raw_title,
            artist: raw_artist,
            duration_ms,
        }),
    }
}

/// Largest image by area. A missing height counts as square; the first image
/// wins a tie.
pub fn pick_largest_image(images: &[ImageRef]) -> Option<&ImageRef> {
    let mut best: Option<(&ImageRef, u64)> = None;
    for img in images {
        let w = img.width.unwrap_or(0) as u64;
        let h = img.height.map(|h| h as u64).unwrap_or(w);
        let area = w * h;
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((img, area)),
        }
    }
    best.map(|(img, _)| img)
}

/// `MM:SS`, both zero-padded. Minutes are not wrapped into hours.
pub fn format_duration_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

fn duration_value_display(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .filter(|s| *s > 0.0)
            .map(|s| format_duration_ms((s * 1000.0) as u64)),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn absolutize(url: &str, api_base: &str) -> String {
    if url.starts_with("/proxy_image") {
        format!("{}{}", api_base.trim_end_matches('/'), url)
    } else {
        url.to_string()
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

// ── Filenames ─────────────────────────────────────────────────────────────────

/// Drop every character outside `[A-Za-z0-9 _-]`. Nothing is collapsed.
pub fn sanitize_filename_component(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect()
}

/// `"<title> - <artist>.<ext>"` for a saved track.
pub fn track_filename(title: &str, artist: &str, format: AudioFormat) -> String {
    format!(
        "{} - {}.{}",
        sanitize_filename_component(title),
        sanitize_filename_component(artist),
        format.extension()
    )
}

// ── Jobs ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Video,
    Audio,
    #[serde(rename = "spotify")]
    Music,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Mp3 => "MP3",
            Self::Wav => "WAV",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Best,
    Worst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOption {
    Video(Quality),
    Audio(AudioFormat),
    Music(AudioFormat),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub id: String,
    pub source_url: String,
    pub kind: JobKind,
    pub format: Option<AudioFormat>,
    pub quality: Option<Quality>,
    pub track: Option<TrackInfo>,
}

impl DownloadJob {
    pub fn format_or_default(&self) -> AudioFormat {
        self.format.unwrap_or(AudioFormat::Mp3)
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Downloading,
    Merging,
    Done,
    Served,
    Error,
    /// Also absorbs status strings this client does not know.
    #[default]
    #[serde(other)]
    Queued,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Served | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub state: JobState,
    pub progress_percent: u8,
    pub message: String,
}

impl From<ProgressPayload> for JobStatus {
    fn from(p: ProgressPayload) -> Self {
        let pct = if p.progress.is_finite() {
            p.progress.round().clamp(0.0, 100.0) as u8
        } else {
            0
        };
        Self {
            state: p.status,
            progress_percent: pct,
            message: p.message.unwrap_or_default(),
        }
    }
}
