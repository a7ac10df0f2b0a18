//! Hearth CLI - install, run and manage a local LLM runtime and its models.

use clap::{Parser, Subcommand};
use std::future::Future;

mod commands;
mod state;

/// Hearth - a local LLM runtime manager
#[derive(Parser)]
#[command(name = "hearth")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the runtime if it is missing
    Install,

    /// Start the runtime and wait until it answers
    Start,

    /// Show the runtime status
    Status,

    /// Download a model, installing and starting the runtime first if needed
    Pull {
        /// Model id (e.g., "llama3.2:1b")
        model: String,
    },

    /// List installed models
    List,

    /// Delete an installed model
    Rm {
        /// Model id
        model: String,
    },

    /// Delete every installed model
    RmAll,

    /// Stop and remove the runtime
    Uninstall,

    /// Delete all models, remove the runtime and clear Hearth's local state
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Browse the model catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },

    /// Show configuration and detected paths
    Info,
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Most downloaded models
    Top {
        /// Number of models to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search models by name or description
    Search {
        /// Search terms; every term must match
        query: String,
        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    match cli.command {
        Commands::Install => block_on(commands::runtime::install()),
        Commands::Start => block_on(commands::runtime::start()),
        Commands::Status => block_on(commands::runtime::status()),
        Commands::Pull { model } => block_on(commands::model::pull(&model)),
        Commands::List => block_on(commands::model::list()),
        Commands::Rm { model } => block_on(commands::model::remove(&model)),
        Commands::RmAll => block_on(commands::model::remove_all()),
        Commands::Uninstall => block_on(commands::runtime::uninstall()),
        Commands::Reset { yes } => block_on(commands::runtime::reset(yes)),
        Commands::Catalog { command } => match command {
            CatalogCommands::Top { limit, json } => block_on(commands::catalog::top(limit, json)),
            CatalogCommands::Search { query, limit, json } => {
                block_on(commands::catalog::search(&query, limit, json))
            }
        },
        Commands::Info => commands::info::run(),
    }
}

fn block_on<F>(future: F) -> miette::Result<()>
where
    F: Future<Output = miette::Result<()>>,
{
    tokio::runtime::Runtime::new()
        .map_err(|e| miette::miette!("Failed to start async runtime: {}", e))?
        .block_on(future)
}
