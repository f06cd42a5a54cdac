mod archive;
mod bootstrap;
mod catalog;
mod cli;
mod commands;
mod config;
mod download;
mod error;
mod install;
mod models;
mod platform;
mod runner;
mod snippets;
mod toolchain;
mod utils;

use anyhow::Result;
use cli::Cli;
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utils::print_error;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::load().map_err(|e| anyhow::anyhow!(e))?;

    let cli = Cli::new(config);
    if let Err(e) = cli.run().await {
        if e.is_fatal() {
            print_error("RunGo does not support this platform");
        } else if e.is_retryable() {
            print_error("The operation failed but can be retried");
        }
        return Err(anyhow::anyhow!(e));
    }

    Ok(())
}
