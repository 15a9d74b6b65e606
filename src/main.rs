//! vidsift CLI - inspect parser definitions and resolve video pages from the
//! command line.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cmd;

#[derive(Parser)]
#[command(name = "vidsift")]
#[command(about = "Turn video page URLs into structured metadata and playable links")]
#[command(version)]
struct Cli {
    /// Parser definitions file (default: the user config dir).
    #[arg(long, global = true, value_name = "FILE")]
    parsers: Option<PathBuf>,

    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which parser definition claims a URL
    Match {
        /// Page URL to test
        url: String,
    },
    /// Fetch a page and extract its video metadata
    Parse {
        /// Page URL to parse
        url: String,
    },
    /// Resolve URLs end to end: parser, metadata, playback links
    Resolve {
        /// Page URLs to resolve
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// List configured parser definitions
    Parsers {
        /// Include disabled definitions
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; --verbose only sets the fallback level.
    let fallback = if cli.verbose { "vidsift=debug" } else { "vidsift=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Match { url } => cmd::resolve::match_url(&url, cli.parsers, cli.json).await,
        Commands::Parse { url } => cmd::resolve::parse_url(&url, cli.parsers, cli.json).await,
        Commands::Resolve { urls } => cmd::resolve::resolve_urls(&urls, cli.parsers, cli.json).await,
        Commands::Parsers { all } => cmd::parsers::list(cli.parsers, all, cli.json).await,
    }
}
