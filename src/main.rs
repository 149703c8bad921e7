//! prompush - push a Prometheus metrics file to a Pushgateway
//!
//! # Usage
//! ```sh
//! prompush --gateway https://pushgateway.example.com:9091 --job backup --metrics /var/lib/backup/metrics.prom
//! ```
//!
//! Every flag falls back to a `PROMPUSH_*` environment variable; a `.env`
//! file in the working directory is loaded first. See `--help`.

use clap::Parser;
use prompush::application::Program;
use prompush::config::{Cli, Options};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = Options::from_env(cli)?;
    let program = Program::new(options)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, abandoning push");
                cancel.cancel();
            }
        }
    });

    program.run(&cancel).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stderr_layer)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Stage errors already embed their causes.
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
