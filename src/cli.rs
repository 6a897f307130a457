//! Command-line interface definitions using clap
//!
//! This module defines the CLI structure for linkvault using clap's derive macros.

use clap::{Parser, Subcommand};

/// Linkvault - link registry for a multi-owner URL shortener
#[derive(Parser, Debug)]
#[command(name = "linkvault")]
#[command(version)]
#[command(about = "Deduplicating link registry with batched deletion", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    /// Relational database URL (sqlite:, mysql://, postgres://)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Append-only storage file, used when no database URL is set
    #[arg(long, global = true)]
    pub file_storage: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Shorten a URL, reusing the existing link when it is already known
    Add {
        /// URL to shorten
        url: String,

        /// Owner token; a fresh one is generated and printed when omitted
        #[arg(long)]
        owner: Option<String>,
    },

    /// Resolve a short id to its URL
    Get {
        /// Short id
        id: String,
    },

    /// List the links of an owner
    List {
        #[arg(long)]
        owner: String,
    },

    /// Delete links owned by the given owner
    Delete {
        #[arg(long)]
        owner: String,

        /// Short ids to delete
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },

    /// Import links from a JSON file
    ///
    /// The file holds an array of `{"correlation_id": ..., "original_url": ...}`.
    Import {
        /// Input file path
        file_path: String,

        #[arg(long)]
        owner: String,
    },

    /// Check that the storage backend is reachable
    Ping,

    /// Print a fresh owner token
    Token,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: linkvault.example.toml)
        output_path: Option<String>,

        /// Force overwrite without confirmation
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    /// Commands that never touch the storage backend.
    pub fn is_offline(&self) -> bool {
        matches!(self, Commands::Token | Commands::Config { .. })
    }
}
