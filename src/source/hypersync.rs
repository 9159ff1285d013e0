//! HyperSync HTTP log source with endpoint failover.

use async_trait::async_trait;

use super::wire::{HeightResponse, QueryRequest, QueryResponse};
use super::{LogPage, LogSource};
use crate::config::HyperSyncConfig;
use crate::error::IndexerError;
use crate::http::check_status;
use crate::retry::RetryPolicy;

/// Log source backed by a HyperSync endpoint.
///
/// Every request runs under the retry policy against the primary URL; once
/// the primary gives up, the whole call is repeated against the fallback URL
/// when one is configured.
#[derive(Debug, Clone)]
pub struct HyperSyncClient {
    http: reqwest::Client,
    config: HyperSyncConfig,
    retry: RetryPolicy,
}

impl HyperSyncClient {
    /// Creates a client from its configuration slice.
    #[must_use]
    pub const fn new(http: reqwest::Client, config: HyperSyncConfig, retry: RetryPolicy) -> Self {
        Self {
            http,
            config,
            retry,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Current chain height known to the endpoint at `base`.
    async fn height(&self, base: &str) -> Result<u64, IndexerError> {
        let url = format!("{}/height", base.trim_end_matches('/'));
        let response = self.authorize(self.http.get(&url)).send().await?;
        let body: HeightResponse = check_status(response).await?.json().await?;
        Ok(body.height)
    }

    async fn query(&self, base: &str, request: &QueryRequest) -> Result<QueryResponse, IndexerError> {
        let url = format!("{}/query", base.trim_end_matches('/'));
        let response = self
            .authorize(self.http.post(&url).json(request))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn get_logs_from(&self, base: &str, from_block: u64) -> Result<LogPage, IndexerError> {
        let height = self
            .retry
            .run("hypersync_height", || self.height(base))
            .await?;
        let tip = height.saturating_sub(self.config.confirmation_depth);
        if from_block >= tip {
            tracing::debug!(from_block, height, tip, "no confirmed blocks beyond cursor");
            return Ok(LogPage::empty());
        }

        let request = QueryRequest::for_contract(&self.config.contract_address, from_block, tip);
        let response = self
            .retry
            .run("hypersync_query", || self.query(base, &request))
            .await?;
        let page = LogPage::try_from(response)?;
        tracing::debug!(
            from_block,
            to_block = tip,
            logs = page.log_count(),
            next_block = ?page.next_block,
            "hypersync page fetched"
        );
        Ok(page)
    }
}

#[async_trait]
impl LogSource for HyperSyncClient {
    async fn get_logs(&self, from_block: u64) -> Result<LogPage, IndexerError> {
        match self.get_logs_from(&self.config.url, from_block).await {
            Ok(page) => Ok(page),
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => match self.config.fallback_url.as_deref() {
                Some(fallback) => {
                    tracing::warn!(error = %err, fallback, "primary log source failed, using fallback");
                    self.get_logs_from(fallback, from_block).await
                }
                None => Err(err),
            },
        }
    }
}
