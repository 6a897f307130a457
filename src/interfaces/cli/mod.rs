//! CLI interface module
//!
//! Runs one parsed command against a freshly started registry, then shuts
//! the registry down so queued deletions are flushed before exit.

pub mod commands;

use anyhow::Result;

use crate::cli::{Commands, ConfigCommands};
use crate::config::StaticConfig;
use crate::runtime::lifetime::{prepare_startup, shutdown};

/// Run a CLI command from clap-parsed input
pub async fn run_cli_command(cmd: Commands, config: &StaticConfig) -> Result<()> {
    // Commands that need no storage
    match cmd {
        Commands::Token => {
            commands::print_token();
            return Ok(());
        }
        Commands::Config {
            action: ConfigCommands::Generate { output_path, force },
        } => {
            return commands::config_generate(output_path, force);
        }
        _ => {}
    }

    let ctx = prepare_startup(config).await?;
    let service = ctx.link_service.clone();

    let result = match cmd {
        Commands::Add { url, owner } => commands::add_link(&service, url, owner).await,
        Commands::Get { id } => commands::get_link(&service, id).await,
        Commands::List { owner } => commands::list_links(&service, owner).await,
        Commands::Delete { owner, ids } => commands::delete_links(&service, owner, ids).await,
        Commands::Import { file_path, owner } => {
            commands::import_links(&service, file_path, owner).await
        }
        Commands::Ping => commands::ping(&service).await,
        Commands::Token | Commands::Config { .. } => unreachable!("handled above"),
    };

    drop(service);
    shutdown(ctx).await;
    result.map_err(Into::into)
}
