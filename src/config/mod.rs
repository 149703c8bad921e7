//! Configuration module for prompush.
//!
//! Options are resolved in two layers: `PROMPUSH_*` environment variables
//! establish the defaults, then explicitly passed command-line flags
//! override them. Resolution never validates required fields; that is the
//! job of [`crate::domain::config::PushConfig`].

mod cli;
mod push_env_config;

pub use cli::Cli;
pub use push_env_config::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY, ENV_PREFIX, PushEnvConfig};

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidEnv {
        name: String,
        value: String,
        reason: String,
    },
}

/// Resolved, not yet validated, program options.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub gateway_url: String,
    pub root_ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub retries: u32,
    pub retry_delay: Duration,
    pub job: String,
    pub instance: Option<String>,
    pub metrics_file: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            gateway_url: String::new(),
            root_ca_file: None,
            cert_file: None,
            key_file: None,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            job: String::new(),
            instance: None,
            metrics_file: PathBuf::new(),
        }
    }
}

impl Options {
    /// Resolve against the process environment.
    pub fn from_env(cli: Cli) -> Result<Self, ConfigError> {
        Ok(Self::merge(PushEnvConfig::from_env()?, cli))
    }

    /// Resolve against an explicit environment map.
    pub fn resolve(environ: &HashMap<String, String>, cli: Cli) -> Result<Self, ConfigError> {
        Ok(Self::merge(PushEnvConfig::from_environ(environ)?, cli))
    }

    fn merge(env: PushEnvConfig, cli: Cli) -> Self {
        Self {
            gateway_url: cli.gateway_url.or(env.gateway_url).unwrap_or_default(),
            root_ca_file: cli.root_ca_file.or(env.root_ca_file),
            cert_file: cli.cert_file.or(env.cert_file),
            key_file: cli.key_file.or(env.key_file),
            retries: cli.retries.unwrap_or(env.retries),
            retry_delay: cli.retry_delay.unwrap_or(env.retry_delay),
            job: cli.job.or(env.job).unwrap_or_default(),
            instance: cli.instance.or(env.instance),
            metrics_file: cli.metrics_file.or(env.metrics_file).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn environ(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("prompush").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_empty() {
        let options = Options::resolve(&HashMap::new(), cli(&[])).unwrap();
        assert_eq!(options, Options::default());
        assert_eq!(options.retries, 2);
        assert_eq!(options.retry_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_args_only() {
        let options = Options::resolve(
            &HashMap::new(),
            cli(&[
                "--gateway=http://localhost:1234",
                "--retries=100",
                "--retry-delay=2h",
                "--metrics=/a/b/c",
            ]),
        )
        .unwrap();

        assert_eq!(
            options,
            Options {
                gateway_url: "http://localhost:1234".to_string(),
                retries: 100,
                retry_delay: Duration::from_secs(2 * 3600),
                metrics_file: PathBuf::from("/a/b/c"),
                ..Options::default()
            }
        );
    }

    #[test]
    fn test_env_only() {
        let options = Options::resolve(
            &environ(&[
                ("PROMPUSH_URL", "http://localhost:9876"),
                ("PROMPUSH_RETRIES", "123"),
                ("PROMPUSH_RETRY_DELAY", "4h"),
                ("PROMPUSH_METRICS_FILE", "/not/found"),
            ]),
            cli(&[]),
        )
        .unwrap();

        assert_eq!(
            options,
            Options {
                gateway_url: "http://localhost:9876".to_string(),
                retries: 123,
                retry_delay: Duration::from_secs(4 * 3600),
                metrics_file: PathBuf::from("/not/found"),
                ..Options::default()
            }
        );
    }

    #[test]
    fn test_flag_overrides_env() {
        let options = Options::resolve(
            &environ(&[
                ("PROMPUSH_URL", "http://from-env:9091"),
                ("PROMPUSH_JOB_NAME", "env-job"),
                ("PROMPUSH_INSTANCE_NAME", "env-instance"),
                ("PROMPUSH_RETRIES", "7"),
                ("PROMPUSH_RETRY_DELAY", "3s"),
            ]),
            cli(&["--gateway", "http://from-flag:9091", "--retries", "0"]),
        )
        .unwrap();

        // explicit flags win
        assert_eq!(options.gateway_url, "http://from-flag:9091");
        assert_eq!(options.retries, 0);
        // omitted flags keep the environment value
        assert_eq!(options.job, "env-job");
        assert_eq!(options.instance.as_deref(), Some("env-instance"));
        assert_eq!(options.retry_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_tls_paths_merge_independently() {
        let options = Options::resolve(
            &environ(&[
                ("PROMPUSH_CACERT_FILE", "/env/ca.pem"),
                ("PROMPUSH_KEY_FILE", "/env/key.pem"),
            ]),
            cli(&["--cert", "/flag/cert.pem", "--key", "/flag/key.pem"]),
        )
        .unwrap();

        assert_eq!(options.root_ca_file, Some(PathBuf::from("/env/ca.pem")));
        assert_eq!(options.cert_file, Some(PathBuf::from("/flag/cert.pem")));
        assert_eq!(options.key_file, Some(PathBuf::from("/flag/key.pem")));
    }

    #[test]
    fn test_invalid_env_value_fails_resolution() {
        let result = Options::resolve(&environ(&[("PROMPUSH_RETRIES", "many")]), cli(&[]));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }
}
