use anyhow::{Context, Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::chunking::Chunker;
use crate::config::{Config, StoreBackend, default_base_dir};
use crate::embeddings::{Embedder, EmbeddingClient};
use crate::extractor::{ExtractedDocument, extract_file};
use crate::generation::{ChatClient, ScriptGenerator, TestCase, TestCaseGenerator};
use crate::pipeline::{IngestionPipeline, IngestionStatus};
use crate::retrieval::RetrievalEngine;
use crate::store::open_store;

fn load_config() -> Result<Config> {
    let base_dir = default_base_dir()?;
    Config::load(&base_dir)
}

/// Rebuild the knowledge base from the given files or directories.
///
/// The existing store is cleared first: every build replaces the whole
/// knowledge base rather than merging into it.
#[inline]
pub async fn build(paths: &[PathBuf]) -> Result<()> {
    let config = load_config()?;

    let files = collect_files(paths)?;
    if files.is_empty() {
        bail!("no files found under the given paths");
    }

    let documents = extract_documents(&files);
    println!(
        "Extracted {} of {} files",
        style(documents.len()).green(),
        files.len()
    );

    let embedder = EmbeddingClient::new(&config.embedding)?;
    embedder
        .health_check()
        .context("Embedding server is not reachable; is it running?")?;

    let chunker = Chunker::new(&config.chunking)?;
    let embedder: Arc<dyn Embedder> = Arc::new(embedder);
    let pipeline = IngestionPipeline::new(chunker, Arc::clone(&embedder));

    let mut store = open_store(&config).await?;

    info!("Clearing existing knowledge base before rebuild");
    store.delete_all().await?;

    let report = pipeline.ingest(store.as_mut(), &documents).await;

    if report.status == IngestionStatus::Error {
        bail!("knowledge base build failed: {}", report.message);
    }

    if config.store.backend == StoreBackend::Memory {
        store.persist(&config.snapshot_path()).await?;
    }

    println!(
        "{} {} documents, {} chunks",
        style("Knowledge base built:").green().bold(),
        report.document_count,
        report.chunk_count
    );

    Ok(())
}

/// Retrieve the chunks most relevant to a query and print them ranked.
#[inline]
pub async fn query(text: &str, top_k: Option<usize>) -> Result<()> {
    let config = load_config()?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingClient::new(&config.embedding)?);
    let engine = RetrievalEngine::new(embedder);
    let store = open_store(&config).await?;

    let results = engine.retrieve(store.as_ref(), text, top_k).await?;

    if results.is_empty() {
        println!("No relevant content found.");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{} {} (chunk {}, distance {:.4})",
            style(format!("{}.", rank + 1)).bold(),
            style(&result.metadata.filename).cyan(),
            result.metadata.chunk_index,
            result.distance
        );
        println!("   {}", excerpt(&result.content, 160));
    }

    Ok(())
}

/// Generate grounded test cases for a query and print them as JSON.
#[inline]
pub async fn generate(text: &str, top_k: Option<usize>) -> Result<()> {
    let config = load_config()?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingClient::new(&config.embedding)?);
    let engine = RetrievalEngine::new(embedder);
    let store = open_store(&config).await?;

    let context = engine.retrieve(store.as_ref(), text, top_k).await?;

    let generator = TestCaseGenerator::new(Arc::new(ChatClient::new(&config.generation)?));
    let cases = generator.generate(text, &context);

    if cases.is_empty() {
        println!(
            "{}",
            style("No test cases generated. Build the knowledge base with relevant documents first.")
                .yellow()
        );
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&cases)?);
    Ok(())
}

/// Generate a browser-automation script for a test case stored as JSON.
#[inline]
pub async fn script(
    test_case_path: &Path,
    html_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config()?;

    let test_case: TestCase = serde_json::from_str(
        &std::fs::read_to_string(test_case_path)
            .with_context(|| format!("Failed to read {}", test_case_path.display()))?,
    )
    .with_context(|| format!("Failed to parse test case {}", test_case_path.display()))?;

    let html = match html_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => String::new(),
    };

    let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingClient::new(&config.embedding)?);
    let engine = RetrievalEngine::new(embedder);
    let store = open_store(&config).await?;

    // Context for the script comes from the test case itself, not a user query.
    let context_query = format!("{} {}", test_case.feature, test_case.test_scenario);
    let context = engine.retrieve(store.as_ref(), &context_query, 3).await?;

    let generator = ScriptGenerator::new(Arc::new(ChatClient::new(&config.generation)?));
    let generated = generator.generate(&test_case, &html, &context)?;

    match output {
        Some(path) => {
            std::fs::write(path, &generated)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} {}",
                style("Script written to").green(),
                path.display()
            );
        }
        None => println!("{generated}"),
    }

    Ok(())
}

/// Remove every record from the knowledge base.
#[inline]
pub async fn clear() -> Result<()> {
    let config = load_config()?;

    let mut store = open_store(&config).await?;
    store.delete_all().await?;

    if config.store.backend == StoreBackend::Memory {
        store.persist(&config.snapshot_path()).await?;
    }

    println!("{}", style("Knowledge base cleared.").green());
    Ok(())
}

/// Show knowledge base and configuration status.
#[inline]
pub async fn show_status() -> Result<()> {
    let config = load_config()?;

    println!("Store backend: {}", config.store.backend);
    println!("Embedding model: {}", config.embedding.model);
    println!(
        "Chunking: {} chars, {} overlap",
        config.chunking.chunk_size, config.chunking.chunk_overlap
    );

    let store = open_store(&config).await?;
    println!("Stored chunks: {}", store.count().await?);

    let embedder = EmbeddingClient::new(&config.embedding)?;
    match embedder.ping() {
        Ok(()) => println!("Embedding server: {}", style("reachable").green()),
        Err(e) => println!("Embedding server: {} ({e})", style("unreachable").red()),
    }

    Ok(())
}

/// Expand files and directories into a flat, sorted file list. Directories
/// are scanned one level deep, matching how an upload folder is laid out.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory {}", path.display()))?
            {
                let entry_path = entry?.path();
                if entry_path.is_file() {
                    files.push(entry_path);
                }
            }
        } else {
            files.push(path.clone());
        }
    }

    files.sort();
    Ok(files)
}

/// Extract every file, skipping ones that fail with a warning. Per-document
/// extraction failures never abort the batch.
fn extract_documents(files: &[PathBuf]) -> Vec<ExtractedDocument> {
    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .expect("static progress template is valid"),
    );

    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        progress.set_message(
            file.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        match extract_file(file) {
            Ok(document) => documents.push(document),
            Err(e) => {
                warn!("Skipping {}: {}", file.display(), e);
                progress.println(format!(
                    "{} {}: {e}",
                    style("skipped").yellow(),
                    file.display()
                ));
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    documents
}

fn excerpt(content: &str, limit: usize) -> String {
    let flattened: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= limit {
        return flattened;
    }
    let cut: String = flattened.chars().take(limit).collect();
    format!("{cut}…")
}
