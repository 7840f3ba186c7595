//! HTTP source for the monitoring backend's REST API.

use super::{Category, SampleSource, SourceError};
use crate::model::Snapshot;

use async_trait::async_trait;
use std::time::Duration;

/// Fetches snapshots from `{base_url}/metrics` and sections from
/// `{base_url}/{category}`.
#[derive(Clone)]
pub struct HttpSampleSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSampleSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", base_url.trim_end_matches('/'))
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_body(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        let response = self.client.get(self.url(path)).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Transport(format!("timed out after {:?}", self.timeout))
            } else {
                SourceError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        Ok(body.to_vec())
    }

    /// Fetch one category endpoint. The response only fills that section of
    /// the returned snapshot; everything else stays at its default.
    pub async fn fetch_category(&self, category: Category) -> Result<Snapshot, SourceError> {
        let body = self.get_body(category.path()).await?;
        Snapshot::from_json(&body).map_err(|e| SourceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SampleSource for HttpSampleSource {
    async fn fetch(&self) -> Result<Snapshot, SourceError> {
        let body = self.get_body("metrics").await?;
        Snapshot::from_json(&body).map_err(|e| SourceError::Decode(e.to_string()))
    }

    fn describe(&self) -> String {
        self.url("metrics")
    }
}
