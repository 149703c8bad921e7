pub mod http_client_factory;
pub mod retry;

pub use http_client_factory::{HttpClientFactory, TransportError};
pub use retry::{
    ExponentialBackoff, RetryError, RetryObserver, RetryPolicy, RetryablePredicate, retry,
};
