//! Command-line flags.
//!
//! Every flag is optional: an omitted flag keeps the value resolved from the
//! environment (or the built-in default).

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Parser)]
#[command(
    author,
    version,
    about = "Push a Prometheus metrics file to a Pushgateway",
    long_about = None
)]
pub struct Cli {
    /// Pushgateway URL (e.g. https://pushgateway.example.com:9091). Defaults to $PROMPUSH_URL.
    #[arg(long = "gateway", value_name = "URL")]
    pub gateway_url: Option<String>,

    /// Path to CA certificate file for server verification. Defaults to $PROMPUSH_CACERT_FILE.
    #[arg(long = "cacert", value_name = "FILE")]
    pub root_ca_file: Option<PathBuf>,

    /// Path to client certificate file. Defaults to $PROMPUSH_CERT_FILE.
    #[arg(long = "cert", value_name = "FILE")]
    pub cert_file: Option<PathBuf>,

    /// Path to client private key file. Defaults to $PROMPUSH_KEY_FILE.
    #[arg(long = "key", value_name = "FILE")]
    pub key_file: Option<PathBuf>,

    /// Number of retries for transient failures. Defaults to $PROMPUSH_RETRIES or 2.
    #[arg(long)]
    pub retries: Option<u32>,

    /// Initial delay between push retries (e.g. 10s, 1m30s). Defaults to $PROMPUSH_RETRY_DELAY or 10s.
    #[arg(long, alias = "retry_delay", value_parser = humantime::parse_duration)]
    pub retry_delay: Option<Duration>,

    /// Job label for the metrics. Defaults to $PROMPUSH_JOB_NAME.
    #[arg(long)]
    pub job: Option<String>,

    /// Instance label (e.g. server01). Defaults to $PROMPUSH_INSTANCE_NAME.
    #[arg(long)]
    pub instance: Option<String>,

    /// Path to the file containing metrics in Prometheus text exposition format. Defaults to $PROMPUSH_METRICS_FILE.
    #[arg(long = "metrics", value_name = "FILE")]
    pub metrics_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags() {
        let cli = Cli::try_parse_from(["prompush"]).unwrap();
        assert!(cli.gateway_url.is_none());
        assert!(cli.retries.is_none());
        assert!(cli.retry_delay.is_none());
    }

    #[test]
    fn test_flags_parse() {
        let cli = Cli::try_parse_from([
            "prompush",
            "--gateway=http://localhost:1234",
            "--retries=100",
            "--retry-delay=2h",
            "--metrics",
            "/a/b/c",
        ])
        .unwrap();
        assert_eq!(cli.gateway_url.as_deref(), Some("http://localhost:1234"));
        assert_eq!(cli.retries, Some(100));
        assert_eq!(cli.retry_delay, Some(Duration::from_secs(2 * 3600)));
        assert_eq!(cli.metrics_file, Some(PathBuf::from("/a/b/c")));
    }

    #[test]
    fn test_retry_delay_underscore_alias() {
        let cli = Cli::try_parse_from(["prompush", "--retry_delay", "1m 30s"]).unwrap();
        assert_eq!(cli.retry_delay, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["prompush", "--retries=-3"]).is_err());
        assert!(Cli::try_parse_from(["prompush", "--retry-delay=later"]).is_err());
    }
}
