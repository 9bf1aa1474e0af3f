use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docs_rag::Result;
use docs_rag::commands::{init_config, query, rebuild, show_config, show_status};
use docs_rag::config::{Config, get_config_dir};

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "Retrieval-augmented question answering over local markdown documentation")]
#[command(version)]
struct Cli {
    /// Override the configuration directory
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or initialize the configuration
    Config {
        /// Show current configuration instead of writing it to disk
        #[arg(long)]
        show: bool,
    },
    /// Rebuild the vector index from the configured document directory
    Rebuild,
    /// Ask a question against the indexed documents
    Query {
        /// The question to answer
        query: String,
        /// Number of chunks to retrieve as context
        #[arg(long)]
        top_k: Option<usize>,
        /// Drop retrieved chunks scoring below this relevance (0.0 to 1.0)
        #[arg(long)]
        min_relevance: Option<f32>,
    },
    /// Show the state of the persisted index
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    let config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                init_config(&config)?;
            }
        }
        Commands::Rebuild => {
            rebuild(&config).await?;
        }
        Commands::Query {
            query: text,
            top_k,
            min_relevance,
        } => {
            query(&config, &text, top_k, min_relevance).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}
