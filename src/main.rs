//! Task Board
//!
//! A server-rendered task tracker: filtered listings, priority sorting,
//! optional task images and completion statistics.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::fs::OpenOptions;
use std::sync::Arc;
use task_board::cli::{Cli, Command, ListArgs, ShowArgs, StatsArgs};
use task_board::config::{Config, ConfigLoader, ConfigPaths};
use task_board::db::Database;
use task_board::db::query::TaskQuery;
use task_board::format::{self, OutputFormat};
use task_board::types::Task;
use task_board::web::{self, AppState, MediaStore};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// `RUST_LOG` when set, otherwise DEBUG or INFO depending on `--verbose`.
fn log_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let filter = || log_filter(cli.verbose);
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let mut paths = ConfigPaths::discover();
    if let Some(config_path) = &cli.config {
        paths = paths.with_explicit(config_path);
    }
    let mut loader = ConfigLoader::load_with_paths(paths)?;
    if let Some(path) = loader.config_path() {
        info!(path = %path.display(), "Loaded configuration");
    }

    cli.apply_overrides(loader.config_mut());
    let config = loader.into_config();

    match cli.command {
        Some(Command::List(args)) => run_list(&config, args)?,
        Some(Command::Show(args)) => run_show(&config, args)?,
        Some(Command::Stats(args)) => run_stats(&config, args)?,
        Some(Command::Serve) | None => run_server(config).await?,
    }

    Ok(())
}

fn open_database(config: &Config) -> Result<Database> {
    config.ensure_db_dir()?;
    Database::open(&config.server.db_path)
}

/// Run the web server until Ctrl-C.
async fn run_server(config: Config) -> Result<()> {
    let db = Arc::new(open_database(&config)?);
    config.ensure_media_dir()?;

    let state = AppState::new(db, MediaStore::from_config(&config.media));
    let handle = web::start_server(state, &config.bind_addr()).await?;
    info!(addr = %handle.addr(), "Press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");
    handle.shutdown().await;

    Ok(())
}

/// Print a listing to stdout.
fn run_list(config: &Config, args: ListArgs) -> Result<()> {
    let db = open_database(config)?;

    let query = TaskQuery::from_params(
        args.filter.as_deref(),
        args.q.as_deref(),
        args.sort.as_deref(),
    );
    let tasks: Vec<Task> = db.query_tasks(&query)?.collect();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
        OutputFormat::Markdown => {
            let heading = web::handlers::list_title(args.filter.as_deref(), query.search.as_deref());
            print!("{}", format::format_tasks_markdown(&heading, &tasks, Utc::now()));
        }
    }

    Ok(())
}

/// Print one task to stdout.
fn run_show(config: &Config, args: ShowArgs) -> Result<()> {
    let db = open_database(config)?;
    let task = db.require_task(args.id)?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&task)?),
        OutputFormat::Markdown => print!("{}", format::format_task_markdown(&task)),
    }

    Ok(())
}

/// Print statistics to stdout.
fn run_stats(config: &Config, args: StatsArgs) -> Result<()> {
    let db = open_database(config)?;
    let stats = db.get_statistics()?;

    match args.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&format::statistics_json(&stats))?
        ),
        OutputFormat::Markdown => print!("{}", format::format_statistics_markdown(&stats)),
    }

    Ok(())
}
