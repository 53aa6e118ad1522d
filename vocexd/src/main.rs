//! Vocex daemon entry point.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vocexdlib::{config::load_config, indexer::start_indexer};

#[derive(Parser, Debug)]
#[command(name = "vocexd", version, about = "Vocex explorer sync daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "./vocexd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let (mut handle, tokens) = match start_indexer(config).await {
        Ok(started) => started,
        Err(e) => {
            error!("Failed to start Vocex: {e}");
            std::process::exit(1);
        }
    };

    let finished = tokio::select! {
        result = &mut handle => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    let result = match finished {
        Some(result) => result,
        None => {
            info!("Shutdown signal received.");
            tokens.cancel_all();
            handle.await
        }
    };

    match result {
        Ok(Ok(())) => info!("Vocex stopped."),
        Ok(Err(e)) => {
            error!("Vocex exited with error: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Vocex task failed: {e}");
            std::process::exit(1);
        }
    }
}
