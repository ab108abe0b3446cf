use crate::types::Payload;
use anyhow::{Context, Result};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why a GET did not produce a usable body.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("invalid JSON body: {0}")]
    Decode(String),
}

/// Thin GET wrapper shared by every dashboard section.
#[derive(Clone)]
pub struct JsonFetcher {
    client: reqwest::Client,
}

impl JsonFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Build HTTP client")?;
        Ok(Self { client })
    }

    /// GET `url` and decode the JSON body as `T`.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self.get(url).await?;
        serde_json::from_str(&body).map_err(|e| {
            debug!("Decode failed for {url}: {e}");
            FetchError::Decode(e.to_string())
        })
    }

    /// GET `url` and return the raw body text.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.get(url).await
    }

    /// GET `url` and classify the body: `{error: ...}` becomes `Payload::Empty`.
    pub async fn fetch_payload<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Payload<T>, FetchError> {
        let value: Value = self.fetch_json(url).await?;
        Payload::from_value(value).map_err(|e| {
            debug!("Schema mismatch for {url}: {e}");
            FetchError::Decode(e.to_string())
        })
    }

    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let busted = cache_busted(url)?;

        let resp = self
            .client
            .get(busted)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| {
                debug!("GET {url} failed: {e}");
                FetchError::Network(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            debug!("GET {url} returned {status}");
            return Err(FetchError::Status(status.as_u16()));
        }

        resp.text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

/// Append a `t=<unix millis>` query parameter so intermediate caches never answer.
pub fn cache_busted(url: &str) -> Result<Url, FetchError> {
    let mut parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let stamp = chrono::Utc::now().timestamp_millis().to_string();
    parsed.query_pairs_mut().append_pair("t", &stamp);
    Ok(parsed)
}
