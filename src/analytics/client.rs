//! HTTP client for the batch text-analytics endpoint.

use super::{result_from_response, BatchAnalyzer};
use crate::config::AnalyticsConfig;
use crate::models::{AnalyticKind, AnalyticResult, Batch};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

pub struct AnalyticsClient {
    http: reqwest::Client,
    endpoint: String,
    key: Option<String>,
    timeout_seconds: u64,
}

impl AnalyticsClient {
    pub fn new(config: &AnalyticsConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim();
        if endpoint.is_empty() {
            return Err(anyhow!("analytics is enabled but no endpoint is configured"));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            key: config.key.clone(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Full URL for one analytic kind.
    pub fn url(&self, kind: AnalyticKind) -> String {
        if self.endpoint.ends_with('/') {
            format!("{}{}", self.endpoint, kind.path())
        } else {
            format!("{}/{}", self.endpoint, kind.path())
        }
    }
}

#[async_trait]
impl BatchAnalyzer for AnalyticsClient {
    async fn analyze(&self, kind: AnalyticKind, batch: &Batch) -> Result<AnalyticResult> {
        let url = self.url(kind);
        debug!("POST {} ({} documents)", url, batch.len());

        let mut request = self.http.post(&url).json(batch);
        if let Some(key) = &self.key {
            request = request.header(KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow!("Analytics request timed out after {}s", self.timeout_seconds)
            } else if e.is_connect() {
                anyhow!("Cannot connect to analytics endpoint at {}", self.endpoint)
            } else {
                anyhow!("Failed to send analytics request: {}", e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Analytics API error {} for {}: {}", status, kind, body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse analytics response")?;

        if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                warn!("Analytics reported {} document error(s) for {}", errors.len(), kind);
            }
        }

        Ok(result_from_response(kind, &body)?)
    }
}
