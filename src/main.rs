//! # Record Catalog CLI (`catalog`)
//!
//! The `catalog` binary validates the catalog configuration, runs searches
//! from the command line and starts the HTTP search server.
//!
//! ## Usage
//!
//! ```bash
//! catalog --config ./config/catalog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `catalog check` | Validate the config and print every record type |
//! | `catalog types` | List record types with their sources |
//! | `catalog search` | Run one search and print the result page |
//! | `catalog serve` | Start the HTTP search server |
//!
//! ## Examples
//!
//! ```bash
//! # Search locations in Boston
//! catalog search --type location --param city=Boston
//!
//! # Second page, sorted by name, in German
//! catalog search --type location --param start=20 --param sort=name.asc --lang de
//! ```
//!
//! Logging is controlled by `RUST_LOG`, falling back to `[server].log_level`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use record_catalog::{catalog, config, search, server, sources};

/// Record Catalog CLI: faceted search over a catalog of records.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/catalog.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "catalog",
    about = "Record Catalog: faceted search over a catalog of records",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/catalog.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the declared record types.
    ///
    /// Builds every registry without contacting the search backend.
    Check,

    /// List record types and the sources contributing to each.
    Types,

    /// Run a search and print the result page.
    ///
    /// Non-canonical requests print the canonical URL and are re-run on
    /// it, the way a browser follows the redirect.
    Search {
        /// Record type to search (defaults to the first configured type).
        #[arg(long = "type")]
        record_type: Option<String>,

        /// Language for titles and labels.
        #[arg(long)]
        lang: Option<String>,

        /// Search parameters as `key=value` pairs.
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Start the HTTP search server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

/// Parse a `key=value` pair for `--param` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg.server.log_level);

    match cli.command {
        Commands::Check => {
            catalog::run_check(&cfg)?;
        }
        Commands::Types => {
            sources::list_types(&cfg).await?;
        }
        Commands::Search {
            record_type,
            lang,
            params,
        } => {
            search::run_search(&cfg, record_type, lang, params).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
