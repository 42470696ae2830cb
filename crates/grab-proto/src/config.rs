use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use super::platform;

/// Environment variable that overrides `api.base_url`.
pub const API_ENV_VAR: &str = "MEDIAGRAB_API";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the download backend, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Connection setup timeout. Requests themselves are never timed out.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

/// Timings of the progress overlay, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_sim_tick_ms")]
    pub sim_tick_ms: u64,
    /// Pause between the 95 / 98 / 100 steps once a direct fetch lands.
    #[serde(default = "default_finish_step_ms")]
    pub finish_step_ms: u64,
    /// Hold "Ready!" this long before delivering a polled job's file.
    #[serde(default = "default_deliver_delay_ms")]
    pub deliver_delay_ms: u64,
    #[serde(default = "default_done_dismiss_ms")]
    pub done_dismiss_ms: u64,
    #[serde(default = "default_error_dismiss_ms")]
    pub error_dismiss_ms: u64,
    #[serde(default = "default_start_error_dismiss_ms")]
    pub start_error_dismiss_ms: u64,
    /// Consecutive failed polls before giving up. 0 polls forever.
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,
    /// Fixed seed for the simulated progress. Random when unset.
    #[serde(default)]
    pub simulation_seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MusicPath {
    /// `POST /api/resolve`; the backend normalizes the track.
    #[default]
    Backend,
    /// `GET /api/scrape`; the raw provider payload is normalized locally.
    Scrape,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolverConfig {
    #[serde(default)]
    pub music_path: MusicPath,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// When false, music tracks are fetched in one request from
    /// `/api/download` and progress is simulated locally.
    #[serde(default = "default_music_progress_polling")]
    pub music_progress_polling: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where finished artifacts are written.
    #[serde(default = "platform::downloads_dir")]
    pub downloads_dir: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_ms: None,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            sim_tick_ms: default_sim_tick_ms(),
            finish_step_ms: default_finish_step_ms(),
            deliver_delay_ms: default_deliver_delay_ms(),
            done_dismiss_ms: default_done_dismiss_ms(),
            error_dismiss_ms: default_error_dismiss_ms(),
            start_error_dismiss_ms: default_start_error_dismiss_ms(),
            max_poll_failures: default_max_poll_failures(),
            simulation_seed: None,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            music_progress_polling: default_music_progress_polling(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            downloads_dir: platform::downloads_dir(),
        }
    }
}

impl ProgressConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sim_tick(&self) -> Duration {
        Duration::from_millis(self.sim_tick_ms)
    }

    pub fn finish_step(&self) -> Duration {
        Duration::from_millis(self.finish_step_ms)
    }

    pub fn deliver_delay(&self) -> Duration {
        Duration::from_millis(self.deliver_delay_ms)
    }

    pub fn done_dismiss(&self) -> Duration {
        Duration::from_millis(self.done_dismiss_ms)
    }

    pub fn error_dismiss(&self) -> Duration {
        Duration::from_millis(self.error_dismiss_ms)
    }

    pub fn start_error_dismiss(&self) -> Duration {
        Duration::from_millis(self.start_error_dismiss_ms)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_poll_interval_ms() -> u64 {
    600
}

fn default_sim_tick_ms() -> u64 {
    300
}

fn default_finish_step_ms() -> u64 {
    250
}

fn default_deliver_delay_ms() -> u64 {
    800
}

fn default_done_dismiss_ms() -> u64 {
    2000
}

fn default_error_dismiss_ms() -> u64 {
    4000
}

fn default_start_error_dismiss_ms() -> u64 {
    3000
}

fn default_max_poll_failures() -> u32 {
    20
}

fn default_music_progress_polling() -> bool {
    true
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        let mut config = if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            info!("config: wrote defaults to {}", config_path.display());
            config
        } else {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)?
        };

        if let Ok(base) = std::env::var(API_ENV_VAR) {
            if !base.trim().is_empty() {
                debug!("config: {} overrides base_url", API_ENV_VAR);
                config.api.base_url = base;
            }
        }
        config.api.base_url = config.api.base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            progress: ProgressConfig::default(),
            resolver: ResolverConfig::default(),
            runner: RunnerConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}
