use anyhow::{Context, Result, bail};
use console::style;
use indicatif::ProgressBar;
use std::time::Duration;
use tracing::info;

use crate::config::UserConfig;
use crate::loader::{Document, DocumentLoader, LoaderConfig, default_ignore_dirs};
use crate::store::VectorStore;

/// Create a new vector store from the configured folder and persist it.
pub fn build(config: &UserConfig) -> Result<()> {
    let documents = load_documents(config)?;
    let settings = config.store_settings()?;

    let mut store = VectorStore::new(&settings)?;
    let spinner = embedding_spinner();
    let result = store.create(&documents);
    spinner.finish_and_clear();
    result.context("failed to build the vector store")?;

    store.save()?;
    println!(
        "{} indexed {} chunks from {} documents",
        style("ok").green(),
        store.vector_count(),
        documents.len()
    );
    println!("store: {}", settings.store_path().display());
    Ok(())
}

/// Append the configured folder to an existing store and persist the result.
pub fn extend(config: &UserConfig) -> Result<()> {
    let documents = load_documents(config)?;
    let settings = config.store_settings()?;

    let mut store = VectorStore::new(&settings)?;
    store.load()?;
    let before = store.vector_count();
    let spinner = embedding_spinner();
    let result = store.extend(&documents);
    spinner.finish_and_clear();
    result.context("failed to extend the vector store")?;

    store.save()?;
    println!(
        "{} added {} chunks ({} total)",
        style("ok").green(),
        store.vector_count() - before,
        store.vector_count()
    );
    Ok(())
}

/// Query the persisted store for the chunks nearest to `query`.
pub fn search(config: &UserConfig, query: &str, limit: usize) -> Result<()> {
    let settings = config.store_settings()?;

    let mut store = VectorStore::new(&settings)?;
    store.load()?;
    let hits = store.search(query, limit)?;

    if hits.is_empty() {
        println!("no matches");
        return Ok(());
    }
    for hit in hits {
        println!(
            "{} {}",
            style(format!("{:>6.3}", hit.score)).cyan(),
            hit.source.display()
        );
        println!("{}", preview(&hit.text));
        println!();
    }
    Ok(())
}

/// Print the resolved configuration.
pub fn show_config(config: &UserConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("failed to render config")?;
    println!("{rendered}");
    Ok(())
}

fn load_documents(config: &UserConfig) -> Result<Vec<Document>> {
    if !config.folder.exists() {
        bail!("folder {} does not exist", config.folder.display());
    }
    info!("using folder {:?}", config.folder);

    let loader = DocumentLoader::new(LoaderConfig {
        filetypes: config.filetypes()?,
        ignore_dirs: default_ignore_dirs(),
    });
    let documents = loader.load_dir(&config.folder)?;
    println!(
        "loaded {} documents from {}",
        documents.len(),
        config.folder.display()
    );
    Ok(documents)
}

fn embedding_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner().with_message("embedding chunks");
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn preview(text: &str) -> String {
    const PREVIEW_CHARS: usize = 200;
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flattened.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}…", &flattened[..cut]),
        None => flattened,
    }
}
