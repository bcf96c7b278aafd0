//! CLI command definitions for task-board
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::format::OutputFormat;
use crate::types::TaskId;

/// Task Board web server and CLI tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Path to media directory (overrides config)
    #[arg(short, long, global = true)]
    pub media_dir: Option<String>,

    /// Address to bind (overrides config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to listen on (default: 8000)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Serve uploaded images from this process (development only)
    #[arg(long, global = true)]
    pub serve_media: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web server (default if no subcommand given)
    Serve,

    /// Print a task listing
    List(ListArgs),

    /// Print one task
    Show(ShowArgs),

    /// Print completion statistics
    Stats(StatsArgs),
}

/// Arguments for `list`; the same parameters as the listing page.
#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// incomplete (default), completed, today, week or all
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Case-insensitive title search
    #[arg(short, long)]
    pub q: Option<String>,

    /// "priority" to order by priority, then due date
    #[arg(short, long)]
    pub sort: Option<String>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Arguments for `show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Task id
    pub id: TaskId,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Arguments for `stats`.
#[derive(Args, Debug, Default)]
pub struct StatsArgs {
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(db_path) = &self.database {
            config.server.db_path = db_path.into();
        }
        if let Some(media_dir) = &self.media_dir {
            config.media.dir = media_dir.into();
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.serve_media {
            config.media.serve = true;
        }
    }
}
