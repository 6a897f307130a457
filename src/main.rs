use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use linkvault::cli::Cli;
use linkvault::config::{get_config, init_config};
use linkvault::errors::LinkvaultError;
use linkvault::interfaces::cli::run_cli_command;
use linkvault::runtime::lifetime::effective_config;
use linkvault::system::init_logging;

async fn run(cli: Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let config = effective_config(&get_config(), cli.database_url, cli.file_storage);

    // 保持 guard 存活直到进程退出
    let _log_guard = init_logging(&config.logging).context("Failed to initialize logging")?;
    debug!("Configuration loaded");

    run_cli_command(cli.command, &config).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<LinkvaultError>() {
                Some(e) => eprintln!("{}", e.format_colored()),
                None => eprintln!("{:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}
