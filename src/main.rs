mod cli;
mod error;
mod handler;
mod metadata;
mod portfolio_tools;
mod prompts;
mod settings;
mod storage;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "starting {}", metadata::PKG_NAME);
    handler::run(cli)
}
