//! Best-effort read of the "downloads remaining" counter.

use async_trait::async_trait;
use grab_proto::protocol::{RemainingPayload, REMAINING_PATH};
use reqwest::Client;
use tracing::debug;

use crate::http::endpoint;

/// Below or at this count the badge turns into a warning.
pub const LOW_QUOTA: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaLevel {
    Normal,
    Low,
    Depleted,
}

impl QuotaLevel {
    pub fn from_remaining(remaining: i64) -> Self {
        if remaining <= 0 {
            Self::Depleted
        } else if remaining <= LOW_QUOTA {
            Self::Low
        } else {
            Self::Normal
        }
    }
}

#[async_trait]
pub trait QuotaReader: Send + Sync {
    /// `None` on any failure; callers keep showing the last value.
    async fn remaining(&self) -> Option<i64>;
}

#[derive(Clone)]
pub struct HttpQuota {
    client: Client,
    base_url: String,
}

impl HttpQuota {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl QuotaReader for HttpQuota {
    async fn remaining(&self) -> Option<i64> {
        let response = match self
            .client
            .get(endpoint(&self.base_url, REMAINING_PATH))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!("quota: request failed: {}", e);
                return None;
            }
        };
        match response.json::<RemainingPayload>().await {
            Ok(p) => Some(p.remaining),
            Err(e) => {
                debug!("quota: unreadable reply: {}", e);
                None
            }
        }
    }
}
