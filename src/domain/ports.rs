use async_trait::async_trait;
use prometheus::proto::MetricFamily;

/// Source of the metric families to transmit.
///
/// Implementations must return the same content on every call; gathering
/// happens once per push attempt.
pub trait Gatherer: Send + Sync {
    fn gather(&self) -> &[MetricFamily];
}

/// One delivery of a snapshot to a metrics gateway.
///
/// Attempts are independent: an implementation keeps no state between
/// calls, so a failed push can simply be invoked again.
#[async_trait]
pub trait MetricsPusher: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn push(&self) -> Result<(), Self::Error>;
}
