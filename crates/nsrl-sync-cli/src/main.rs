mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nsrl-sync", version)]
#[command(about = "Keep a known-file hash set in sync with NSRL reference data")]
struct Cli {
    /// Config file (defaults to ~/.config/nsrl-sync/sources.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch changed sources and import their hashes
    Update,
    /// Check whether a SHA-1 digest is in the hash set
    Check {
        /// Hex SHA-1 digest, any case
        digest: String,
    },
    /// Show each source's last successful update
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let app_config = config::load_config(cli.config.as_deref())?;
    tracing::debug!(
        sources = app_config.sources.len(),
        backend = ?app_config.store.backend,
        "configuration loaded"
    );

    match cli.command {
        Command::Update => commands::update::run(&app_config).await.map(|_| ()),
        Command::Check { digest } => commands::check::run(&app_config.store, &digest)
            .await
            .map(|_| ()),
        Command::Status { json } => commands::status::run(&app_config, json),
    }
}
