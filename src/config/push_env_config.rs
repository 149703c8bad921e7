//! Push configuration parsing from environment variables.
//!
//! Every option can be supplied as `PROMPUSH_<NAME>`. Values are read from an
//! explicit key/value map so resolution can be exercised without touching
//! the process environment.

use super::ConfigError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_PREFIX: &str = "PROMPUSH_";

pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Push environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PushEnvConfig {
    pub gateway_url: Option<String>,
    pub root_ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub retries: u32,
    pub retry_delay: Duration,
    pub job: Option<String>,
    pub instance: Option<String>,
    pub metrics_file: Option<PathBuf>,
}

impl Default for PushEnvConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            root_ca_file: None,
            cert_file: None,
            key_file: None,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            job: None,
            instance: None,
            metrics_file: None,
        }
    }
}

impl PushEnvConfig {
    /// Read from the process environment. Variables that are not valid
    /// UTF-8 are ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environ: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self::from_environ(&environ)
    }

    /// Read from `environ`. Empty values count as unset.
    pub fn from_environ(environ: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            environ
                .get(&format!("{}{}", ENV_PREFIX, name))
                .filter(|value| !value.is_empty())
                .cloned()
        };

        let retries = match var("RETRIES") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| ConfigError::InvalidEnv {
                name: format!("{}RETRIES", ENV_PREFIX),
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_RETRIES,
        };

        let retry_delay = match var("RETRY_DELAY") {
            Some(raw) => {
                humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::InvalidEnv {
                    name: format!("{}RETRY_DELAY", ENV_PREFIX),
                    value: raw.clone(),
                    reason: e.to_string(),
                })?
            }
            None => DEFAULT_RETRY_DELAY,
        };

        Ok(Self {
            gateway_url: var("URL"),
            root_ca_file: var("CACERT_FILE").map(PathBuf::from),
            cert_file: var("CERT_FILE").map(PathBuf::from),
            key_file: var("KEY_FILE").map(PathBuf::from),
            retries,
            retry_delay,
            job: var("JOB_NAME"),
            instance: var("INSTANCE_NAME"),
            metrics_file: var("METRICS_FILE").map(PathBuf::from),
        })
    }
}
