pub mod core;
pub mod exposition;
pub mod pushgateway;
pub mod snapshot;

pub use self::core::{HttpClientFactory, RetryPolicy};
pub use pushgateway::{GroupingKey, PushError, PushGatewayClient};
pub use snapshot::{SnapshotError, load_snapshot};
