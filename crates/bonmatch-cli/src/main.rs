//! CLI application for checking off shopping list items from receipt photos.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{ask, batch, config, extract, list, match_cmd};

/// Receipt matcher - check off shopping list items from a photographed receipt
#[derive(Parser)]
#[command(name = "bonmatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match one receipt against a shopping list
    Match(match_cmd::MatchArgs),

    /// Match several receipts against one shopping list
    Batch(batch::BatchArgs),

    /// Ask the model about a single receipt line
    Ask(ask::AskArgs),

    /// Show the text lines extracted from a receipt
    Extract(extract::ExtractArgs),

    /// Manage the local shopping list file
    List(list::ListArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Match(args) => match_cmd::run(args, config_path).await,
        Commands::Batch(args) => batch::run(args, config_path).await,
        Commands::Ask(args) => ask::run(args, config_path).await,
        Commands::Extract(args) => extract::run(args, config_path).await,
        Commands::List(args) => list::run(args).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
