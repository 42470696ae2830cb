//! Typed failures. The `Display` text of each variant is what the user sees.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Please enter a URL")]
    EmptyUrl,
    /// Explicit `error` field in the backend's JSON, passed through verbatim.
    #[error("{0}")]
    Upstream(String),
    #[error("Backend returned {0}")]
    Status(u16),
    #[error("Invalid response from server.")]
    Malformed,
    #[error("Network error or server unavailable.")]
    Network,
    #[error("Failed to fetch track info. Please try again.")]
    MusicNetwork,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Upstream(String),
    #[error("Backend returned {0}")]
    Status(u16),
    #[error("Invalid response from server.")]
    Malformed,
    #[error("network failure: {0}")]
    Transport(String),
    #[error("This download type is not supported by the server.")]
    Unsupported,
}

impl RunnerError {
    /// Text for the progress overlay. Transport detail is replaced by
    /// `fallback` so it never reaches the user.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Transport(_) => fallback.to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for RunnerError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Could not save file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Backend returned {0}")]
    Status(u16),
    #[error("Download interrupted.")]
    Network(#[source] reqwest::Error),
}
