use crate::config::Options;
use crate::domain::config::{PushConfig, PushConfigError};
use crate::domain::ports::{Gatherer, MetricsPusher};
use crate::infrastructure::core::retry::{RetryError, RetryObserver, RetryPolicy, retry};
use crate::infrastructure::core::{HttpClientFactory, TransportError};
use crate::infrastructure::pushgateway::{
    GroupingKey, INSTANCE_LABEL, PushError, PushGatewayClient, default_retryable,
};
use crate::infrastructure::snapshot::{SnapshotError, load_snapshot};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("invalid configuration: {0}")]
    Config(#[from] PushConfigError),

    #[error("setting up transport: {0}")]
    Transport(#[from] TransportError),

    #[error("loading metrics: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Push(#[from] PushError),

    #[error("push cancelled")]
    Cancelled,
}

impl From<RetryError<PushError>> for ProgramError {
    fn from(err: RetryError<PushError>) -> Self {
        match err {
            RetryError::Cancelled => ProgramError::Cancelled,
            RetryError::Inner(e) => ProgramError::Push(e),
        }
    }
}

/// Logs a retry with the delay truncated to 100ms.
pub fn log_retry<E: fmt::Display>(error: &E, delay: Duration) {
    let millis = u64::try_from(delay.as_millis() / 100 * 100).unwrap_or(u64::MAX);
    warn!(
        "Retrying failed push in {}: {}",
        humantime::format_duration(Duration::from_millis(millis)),
        error
    );
}

/// One push of one metrics file, fully prepared.
///
/// Everything that can fail without touching the network fails in
/// [`Program::new`]; [`Program::run`] only performs the delivery.
pub struct Program<P: MetricsPusher = PushGatewayClient> {
    pusher: P,
    policy: RetryPolicy<P::Error>,
    observer: Arc<dyn RetryObserver<P::Error>>,
}

impl Program {
    /// Validates `options`, then builds the transport, loads the snapshot
    /// and binds the push client, in that order.
    pub fn new(options: Options) -> Result<Self, ProgramError> {
        let config = PushConfig::from_options(options)?;

        let client = HttpClientFactory::create_client(&config.tls)?;
        let snapshot = load_snapshot(&config.metrics_file)?;

        let mut grouping = GroupingKey::new(config.job.clone());
        if let Some(instance) = &config.instance {
            grouping = grouping
                .with_label(INSTANCE_LABEL, instance.clone())
                .map_err(PushError::from)?;
        }

        let gatherer: Arc<dyn Gatherer> = Arc::new(snapshot);
        let pusher = PushGatewayClient::new(client, &config.gateway_url, grouping, gatherer)?;
        let policy = RetryPolicy::with_predicate(
            config.retry.retries,
            config.retry.retry_delay,
            default_retryable(),
        );

        Ok(Self::with_pusher(pusher, policy))
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), ProgramError> {
        debug!(
            "Pushing metrics for job {:?} to {}",
            self.pusher.grouping().job(),
            self.pusher.url()
        );
        self.execute(cancel).await?;
        debug!("Metrics pushed to {}", self.pusher.url());
        Ok(())
    }
}

impl<P> Program<P>
where
    P: MetricsPusher,
    P::Error: fmt::Display,
{
    pub fn with_pusher(pusher: P, policy: RetryPolicy<P::Error>) -> Self {
        Self {
            pusher,
            policy,
            observer: Arc::new(log_retry::<P::Error>),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver<P::Error>>) -> Self {
        self.observer = observer;
        self
    }

    /// Pushes under the retry policy. The last failure is returned as-is.
    pub async fn execute(&self, cancel: &CancellationToken) -> Result<(), RetryError<P::Error>> {
        retry(&self.policy, cancel, self.observer.as_ref(), || {
            self.pusher.push()
        })
        .await
    }
}
