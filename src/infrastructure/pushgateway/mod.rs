//! Prometheus Pushgateway client.
//!
//! Pushes use `PUT`: every metric previously pushed under the same grouping
//! key is replaced.

pub mod client;
pub mod grouping;

pub use client::{PushError, PushGatewayClient, default_retryable};
pub use grouping::{GroupingError, GroupingKey, INSTANCE_LABEL, JOB_LABEL};
