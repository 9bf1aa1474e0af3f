use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::Result;
use crate::config::Config;
use crate::documents::MarkdownDirSource;
use crate::embeddings::ollama::OllamaClient;
use crate::generation::AnswerGenerator;
use crate::index::VectorIndex;
use crate::indexer::IndexBuilder;
use crate::retrieval::{RetrievalOutcome, Retriever};

/// Rebuild the persisted index from the configured document root
#[inline]
pub async fn rebuild(config: &Config) -> Result<()> {
    info!("Rebuilding index from {}", config.source.root.display());

    let source = MarkdownDirSource::new(config.source.root.clone());
    let embedder = Arc::new(OllamaClient::new(&config.ollama)?);
    let builder = IndexBuilder::new(Box::new(source), embedder, config.chunking.clone());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Chunking and embedding documents...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = builder.rebuild(&config.index_path()).await;
    spinner.finish_and_clear();

    let summary = result?;

    println!(
        "Indexed {} documents into {} chunks.",
        summary.documents, summary.chunks
    );
    println!("Index saved to {}", config.index_path().display());

    Ok(())
}

/// Answer a free-text query from the persisted index
#[inline]
pub async fn query(
    config: &Config,
    text: &str,
    top_k: Option<usize>,
    min_relevance: Option<f32>,
) -> Result<()> {
    let index = VectorIndex::open(&config.index_path()).await?;
    let client = Arc::new(OllamaClient::new(&config.ollama)?);

    let mut retrieval = config.retrieval.clone();
    if let Some(top_k) = top_k {
        retrieval.top_k = top_k;
    }
    if min_relevance.is_some() {
        retrieval.min_relevance = min_relevance;
    }

    let retriever = Retriever::new(index, client.clone(), retrieval);

    match retriever.retrieve(text).await? {
        RetrievalOutcome::NoRelevantResults => {
            println!("No relevant results found in the index.");
        }
        RetrievalOutcome::Results(results) => {
            let generator = AnswerGenerator::new(client);
            let answer = generator.generate(text, &results)?;

            println!("Response: {}", answer.text);
            println!("Sources: [{}]", answer.sources.iter().join(", "));
        }
    }

    Ok(())
}

/// Show whether an index exists, how many entries it holds, and whether the
/// Ollama server is reachable
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    let index_path = config.index_path();

    match VectorIndex::open(&index_path).await {
        Ok(index) => {
            let count = index.count_entries().await?;
            println!("Index: {}", index_path.display());
            println!("Entries: {}", count);
        }
        Err(crate::RagError::NotFound(_)) => {
            println!("No index has been built yet.");
            println!(
                "Run 'docs-rag rebuild' to build one from {}.",
                config.source.root.display()
            );
        }
        Err(e) => return Err(e),
    }

    let client = OllamaClient::new(&config.ollama)?;
    match client.ping() {
        Ok(()) => println!("Ollama: reachable at {}", client.base_url()),
        Err(e) => println!("Ollama: unreachable ({:#})", e),
    }

    Ok(())
}

/// Print the active configuration as TOML
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| crate::RagError::Config(format!("Failed to render config: {}", e)))?;

    println!("# {}", config.config_file_path().display());
    print!("{}", rendered);

    Ok(())
}

/// Write the current configuration to disk, creating it if missing
#[inline]
pub fn init_config(config: &Config) -> Result<()> {
    config.save()?;
    println!("Configuration saved to {}", config.config_file_path().display());
    Ok(())
}
