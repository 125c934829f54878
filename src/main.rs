//! # Vault Distill CLI (`distill`)
//!
//! ## Usage
//!
//! ```bash
//! distill --config ./config/distill.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `distill init` | Create the vault folder tree and starter files |
//! | `distill status` | Show inbox file counts and pending files |
//! | `distill run` | Process every new or changed inbox file |
//! | `distill run --file <PATH>` | Process one file inside the vault |
//! | `distill run --dry-run` | Normalize and date files without extracting |
//!
//! Logs go to stderr; set `RUST_LOG=debug` for more detail.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vault_distill::config;
use vault_distill::extraction::{AnthropicTransport, ExtractionClient};
use vault_distill::pipeline::Pipeline;
use vault_distill::{setup, status};

/// Turn AI conversation exports into staged Obsidian notes.
///
/// All commands read a TOML configuration file. See
/// `config/distill.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "distill",
    about = "Turn AI conversation exports into staged Obsidian notes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/distill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vault folder tree. Safe to run repeatedly.
    Init,

    /// List inboxes with file and pending counts. Changes nothing.
    Status,

    /// Extract knowledge items from new or changed conversation files.
    Run {
        /// Normalize and date files but do not call the API or write anything.
        #[arg(long)]
        dry_run: bool,

        /// Process only this file (must be inside the vault). The ledger is
        /// not consulted.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            setup::run_init(&cfg)?;
        }
        Commands::Status => {
            status::print_status(&cfg)?;
        }
        Commands::Run { dry_run, file } => {
            let client = if dry_run {
                None
            } else {
                let transport = AnthropicTransport::from_env(&cfg.extraction)?;
                Some(ExtractionClient::new(&cfg.extraction, Box::new(transport)))
            };
            let pipeline = Pipeline::new(&cfg, client, dry_run)?;
            pipeline.run(file.as_deref()).await?;
        }
    }

    Ok(())
}
