use super::grouping::{GroupingError, GroupingKey};
use crate::domain::ports::{Gatherer, MetricsPusher};
use crate::infrastructure::core::retry::RetryablePredicate;
use async_trait::async_trait;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, ProtobufEncoder};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum PushError {
    /// The request could not be built from the gathered metrics. Sending it
    /// again would fail the same way.
    #[error("invalid push request: {0}")]
    Request(String),

    #[error("sending metrics to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status code {status} while pushing to {url}: {body}")]
    Status {
        status: StatusCode,
        url: String,
        body: String,
    },
}

impl PushError {
    /// Network failures and rejected requests may go away on their own;
    /// request construction errors never do.
    pub fn is_transient(&self) -> bool {
        matches!(self, PushError::Transport { .. } | PushError::Status { .. })
    }
}

impl From<GroupingError> for PushError {
    fn from(err: GroupingError) -> Self {
        PushError::Request(err.to_string())
    }
}

/// Retries transient failures only.
pub fn default_retryable() -> RetryablePredicate<PushError> {
    Arc::new(PushError::is_transient)
}

/// Replaces the gateway's metrics for one grouping key with whatever the
/// gatherer returns.
///
/// The endpoint is resolved once; each `push` re-encodes the gathered
/// families and issues a single `PUT`.
pub struct PushGatewayClient {
    client: Client,
    url: Url,
    grouping: GroupingKey,
    gatherer: Arc<dyn Gatherer>,
}

impl PushGatewayClient {
    pub fn new(
        client: Client,
        gateway: &Url,
        grouping: GroupingKey,
        gatherer: Arc<dyn Gatherer>,
    ) -> Result<Self, PushError> {
        let url = grouping.push_url(gateway)?;
        Ok(Self {
            client,
            url,
            grouping,
            gatherer,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn grouping(&self) -> &GroupingKey {
        &self.grouping
    }

    /// Encodes every non-empty family in length-delimited protobuf.
    fn encode(&self) -> Result<(Vec<u8>, String), PushError> {
        let encoder = ProtobufEncoder::new();
        let mut body = Vec::new();

        for family in self.gatherer.gather() {
            if family.metric.is_empty() {
                continue;
            }
            self.check_grouping_collision(family)?;
            encoder
                .encode(std::slice::from_ref(family), &mut body)
                .map_err(|e| PushError::Request(format!("encoding {}: {}", family.name(), e)))?;
        }

        Ok((body, encoder.format_type().to_string()))
    }

    fn check_grouping_collision(&self, family: &MetricFamily) -> Result<(), PushError> {
        for metric in &family.metric {
            if let Some(label) = metric
                .label
                .iter()
                .find(|label| self.grouping.contains(label.name()))
            {
                return Err(PushError::Request(format!(
                    "pushed metric {} already contains grouping label {}",
                    family.name(),
                    label.name()
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsPusher for PushGatewayClient {
    type Error = PushError;

    async fn push(&self) -> Result<(), PushError> {
        let (body, content_type) = self.encode()?;
        debug!("Pushing {} bytes to {}", body.len(), self.url);

        let response = self
            .client
            .put(self.url.clone())
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|source| PushError::Transport {
                url: self.url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::ACCEPTED {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(PushError::Status {
            status,
            url: self.url.to_string(),
            body,
        })
    }
}
