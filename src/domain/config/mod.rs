//! Configuration domain module
//!
//! Validated value objects built from resolved options.

pub mod push_config;

pub use push_config::{PushConfig, PushConfigError, RetrySettings, TlsFiles};
