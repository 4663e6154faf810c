pub mod http;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::models::{ApiUsageReport, SnapshotCollection};

pub use http::HttpAccountSource;

/// Where account and API key state comes from
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn fetch_accounts(&self) -> Result<SnapshotCollection, SourceError>;

    /// `time_range` is passed through as-is (`today`, `week`, ...)
    async fn fetch_api_keys(&self, time_range: &str) -> Result<ApiUsageReport, SourceError>;
}
