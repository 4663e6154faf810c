use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use super::AccountSource;
use crate::config::ApiConfig;
use crate::error::SourceError;
use crate::models::{ApiUsageReport, SnapshotCollection};

/// Account management API reached over HTTP with a bearer token
pub struct HttpAccountSource {
    client: Client,
    token: Option<String>,
    accounts_url: String,
    accounts_timeout: Duration,
    api_keys_url: String,
    api_keys_timeout: Duration,
}

impl HttpAccountSource {
    pub fn new(config: &ApiConfig) -> Self {
        let base = config.base_url.trim_end_matches('/');
        Self {
            client: Client::new(),
            token: config
                .claude
                .bearer_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            accounts_url: format!("{}{}", base, config.claude.endpoint),
            accounts_timeout: Duration::from_secs(config.claude.timeout),
            api_keys_url: format!("{}{}", base, config.usage.endpoint),
            api_keys_timeout: Duration::from_secs(config.usage.timeout),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<T, SourceError> {
        let token = self.token.as_deref().ok_or(SourceError::MissingToken)?;

        tracing::debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SourceError::Unauthorized(status.as_u16()))
            }
            s if !s.is_success() => return Err(SourceError::Status(s.as_u16())),
            _ => {}
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| SourceError::Parse(e.to_string()))
    }
}

#[async_trait]
impl AccountSource for HttpAccountSource {
    async fn fetch_accounts(&self) -> Result<SnapshotCollection, SourceError> {
        let collection: SnapshotCollection = self
            .get_json(&self.accounts_url, &[], self.accounts_timeout)
            .await?;
        tracing::info!("Fetched {} accounts", collection.data.len());
        Ok(collection)
    }

    async fn fetch_api_keys(&self, time_range: &str) -> Result<ApiUsageReport, SourceError> {
        let report: ApiUsageReport = self
            .get_json(
                &self.api_keys_url,
                &[("timeRange", time_range)],
                self.api_keys_timeout,
            )
            .await?;
        tracing::info!(
            "Fetched usage for {} api keys (timeRange={})",
            report.data.len(),
            time_range
        );
        Ok(report)
    }
}
