//! Push Configuration Domain Value Object
//!
//! A `PushConfig` only exists once every required field is present and the
//! gateway URL is a usable absolute URL. Nothing downstream re-checks it.

use crate::config::Options;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Error type for PushConfig validation
#[derive(Debug, Error, PartialEq)]
pub enum PushConfigError {
    #[error("gateway URL is required")]
    MissingGatewayUrl,

    #[error("job name is required")]
    MissingJob,

    #[error("metrics file is required")]
    MissingMetricsFile,

    #[error("gateway URL {url:?}: {reason}")]
    InvalidGatewayUrl { url: String, reason: String },
}

/// Optional TLS material. `cert` and `key` are only meaningful together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TlsFiles {
    pub root_ca: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

/// Retry budget and base delay for the push.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub retries: u32,
    pub retry_delay: Duration,
}

/// Validated push configuration
///
/// # Invariants
///
/// - `gateway_url` is an absolute http(s) URL
/// - `job` and `metrics_file` are non-empty
/// - `instance` is `None` rather than empty
#[derive(Debug, Clone, PartialEq)]
pub struct PushConfig {
    pub gateway_url: Url,
    pub job: String,
    pub instance: Option<String>,
    pub metrics_file: PathBuf,
    pub tls: TlsFiles,
    pub retry: RetrySettings,
}

impl PushConfig {
    /// Validate resolved options. Performs no I/O.
    pub fn from_options(options: Options) -> Result<Self, PushConfigError> {
        if options.gateway_url.is_empty() {
            return Err(PushConfigError::MissingGatewayUrl);
        }
        if options.job.is_empty() {
            return Err(PushConfigError::MissingJob);
        }
        if options.metrics_file.as_os_str().is_empty() {
            return Err(PushConfigError::MissingMetricsFile);
        }

        let gateway_url = parse_gateway_url(&options.gateway_url)?;

        Ok(Self {
            gateway_url,
            job: options.job,
            instance: options.instance.filter(|i| !i.is_empty()),
            metrics_file: options.metrics_file,
            tls: TlsFiles {
                root_ca: options.root_ca_file,
                cert: options.cert_file,
                key: options.key_file,
            },
            retry: RetrySettings {
                retries: options.retries,
                retry_delay: options.retry_delay,
            },
        })
    }
}

fn parse_gateway_url(raw: &str) -> Result<Url, PushConfigError> {
    let invalid = |reason: String| PushConfigError::InvalidGatewayUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("not a hierarchical URL".to_string()));
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    Ok(url)
}
