//! brainstem CLI entry point

use brainstem::{
    commands::{
        cmd_index, cmd_prune, cmd_query, print_index_stats, print_prune_stats, print_query_output,
        IndexOptions, PruneOptions, QueryCommand,
    },
    config::{default_brain_root, Config},
    error::Result,
    progress::LogWriterFactory,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "brainstem")]
#[command(version, about = "Index a markdown brain into a searchable relationship graph", long_about = None)]
struct Cli {
    /// Brain root directory, used when a command gets no ROOT (defaults to ~/brain)
    #[arg(short, long, global = true, env = "BRAIN_ROOT")]
    root: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the brain and bring the index up to date
    #[command(alias = "indexer")]
    Index {
        /// Brain root directory
        #[arg(value_name = "ROOT")]
        brain_root: Option<PathBuf>,

        /// Drop the database and rebuild it from scratch
        #[arg(long)]
        full: bool,
    },

    /// Query the relationship graph
    #[command(alias = "query-graph")]
    Query {
        /// Brain root directory
        #[arg(value_name = "ROOT")]
        brain_root: Option<PathBuf>,

        #[command(subcommand)]
        query: GraphCommand,
    },

    /// Remove documents whose files are gone
    Prune {
        /// Brain root directory
        #[arg(value_name = "ROOT")]
        brain_root: Option<PathBuf>,

        /// Dry run - show what would be removed
        #[arg(long)]
        dry_run: bool,

        /// Also remove entities with no document and no edges
        #[arg(long)]
        orphans: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum GraphCommand {
    /// Everything linked to an entity
    Connections {
        /// Name fragment (multiple words are joined)
        #[arg(required = true)]
        name: Vec<String>,
    },

    /// Threads and meetings for a person
    Person {
        #[arg(required = true)]
        name: Vec<String>,
    },

    /// Related threads, meetings and people for a thread
    Thread {
        #[arg(required = true)]
        name: Vec<String>,
    },

    /// Full-text search across all documents
    Timeline {
        #[arg(required = true)]
        term: Vec<String>,
    },

    /// Store counts and most connected entities
    Stats,
}

impl From<GraphCommand> for QueryCommand {
    fn from(command: GraphCommand) -> Self {
        match command {
            GraphCommand::Connections { name } => QueryCommand::Connections(name.join(" ")),
            GraphCommand::Person { name } => QueryCommand::Person(name.join(" ")),
            GraphCommand::Thread { name } => QueryCommand::Thread(name.join(" ")),
            GraphCommand::Timeline { term } => QueryCommand::Timeline(term.join(" ")),
            GraphCommand::Stats => QueryCommand::Stats,
        }
    }
}

impl Commands {
    /// Root given positionally to the command, if any
    fn brain_root(&self) -> Option<&PathBuf> {
        match self {
            Commands::Index { brain_root, .. }
            | Commands::Query { brain_root, .. }
            | Commands::Prune { brain_root, .. } => brain_root.as_ref(),
            Commands::Completions { .. } => None,
        }
    }
}

/// Positional root, then `--root`/`BRAIN_ROOT`, then `~/brain`
fn resolve_root(cli: &Cli) -> PathBuf {
    cli.command
        .brain_root()
        .or(cli.root.as_ref())
        .cloned()
        .unwrap_or_else(default_brain_root)
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Completions need neither config nor a brain
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "brainstem", &mut std::io::stdout());
        return Ok(());
    }

    let config = Config::load_or_default(cli.config.as_deref())?;
    let root = resolve_root(&cli);
    debug!("Using brain root {:?}", root);

    match cli.command {
        Commands::Index { full, .. } => {
            let stats = cmd_index(&config, &root, IndexOptions { full }).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_index_stats(&stats);
            }
        }

        Commands::Query { query, .. } => {
            let output = cmd_query(&config, &root, query.into()).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_query_output(&output);
            }
        }

        Commands::Prune {
            dry_run, orphans, ..
        } => {
            let stats = cmd_prune(&config, &root, PruneOptions { dry_run, orphans }).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_prune_stats(&stats);
            }
        }

        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}
