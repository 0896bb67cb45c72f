use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KbError>;

#[derive(Error, Debug)]
pub enum KbError {
    #[error("vector store is already initialized; create() can only run once per store")]
    AlreadyInitialized,

    #[error("vector store is not initialized; run create() or load() first")]
    NotInitialized,

    #[error("no persisted store found ({missing:?} is missing); run `create` first to build one")]
    StoreNotFound { missing: PathBuf },

    #[error("unsupported model type: {0:?} (expected \"openai\" or \"ollama\")")]
    UnsupportedModelType(String),

    #[error("no parser available for {path:?}")]
    UnsupportedFileType { path: PathBuf },

    #[error(
        "embedding provider failed after committing {committed_chunks} of {total_chunks} chunks \
         ({committed_batches} of {total_batches} batches): {source}"
    )]
    ProviderBatchFailure {
        committed_chunks: usize,
        total_chunks: usize,
        committed_batches: usize,
        total_batches: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("corrupt store: {0}")]
    CorruptStore(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub mod chunker;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod loader;
pub mod store;
