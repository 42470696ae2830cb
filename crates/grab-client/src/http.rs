//! Shared reqwest plumbing for the backend API.

use std::time::Duration;

use grab_proto::config::ApiConfig;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

const USER_AGENT: &str = concat!("mediagrab/", env!("CARGO_PKG_VERSION"));

/// One client for the whole process so connections and TLS sessions are
/// shared. Only connection setup may time out.
pub fn build_client(api: &ApiConfig) -> reqwest::Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10));
    if let Some(ms) = api.connect_timeout_ms {
        builder = builder.connect_timeout(Duration::from_millis(ms));
    }
    builder.build()
}

pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// A response body read to the end and parsed as JSON where possible.
pub(crate) struct JsonReply<T> {
    pub status: StatusCode,
    /// `None` when the body was not valid JSON for `T`.
    pub body: Option<T>,
}

/// Read `response` fully. Transport failures while reading surface as `Err`;
/// a body that does not parse yields `body: None`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
) -> reqwest::Result<JsonReply<T>> {
    let status = response.status();
    let bytes = response.bytes().await?;
    let body = serde_json::from_slice::<T>(&bytes).ok();
    Ok(JsonReply { status, body })
}
