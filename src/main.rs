//! # notedex CLI (`ndx`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ndx sync` | Detect new, changed, and deleted documents and update the index |
//! | `ndx sync --full` | Ignore saved state and reprocess every eligible document |
//! | `ndx search "<query>"` | Rank indexed documents against a query |
//!
//! All commands accept `--config` pointing to a TOML configuration file.
//! See `config/notedex.example.toml` for a full example.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use notedex::config::load_config;
use notedex::embedding::create_provider;
use notedex::index::SqliteIndex;
use notedex::{query, sync};

#[derive(Parser)]
#[command(
    name = "ndx",
    about = "notedex — an incremental semantic index for your Markdown notes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/notedex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect new, changed, and deleted documents and update the index.
    ///
    /// Change detection uses the configured tracking method: mtime+size
    /// fingerprints, or commit diffs when the notes directory is a Git
    /// repository and `tracking.method = "git"`.
    Sync {
        /// Ignore saved state and reprocess every eligible document.
        #[arg(long)]
        full: bool,
    },

    /// Rank indexed documents against a query.
    Search {
        query: String,

        /// Maximum number of results.
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let index = SqliteIndex::connect(&config.index.db_path).await?;
    let provider = create_provider(&config.embedding)?;

    match cli.command {
        Commands::Sync { full } => {
            let changed = sync::run(&config, &index, provider.as_ref(), full).await?;
            if changed {
                println!("Document embeddings have been updated, you can now query your content.");
            } else {
                println!("No changes detected. Document embeddings are up-to-date.");
            }
        }
        Commands::Search { query: text, limit } => {
            query::run_search(&index, provider.as_ref(), &text, limit).await?;
        }
    }

    index.close().await;
    Ok(())
}
