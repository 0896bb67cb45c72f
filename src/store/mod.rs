#[cfg(test)]
mod tests;

pub mod index;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::chunker::Chunker;
use crate::config::StoreSettings;
use crate::embeddings::{EmbeddingProvider, resolve_provider};
use crate::loader::Document;
use crate::{KbError, Result};

pub use index::FlatIndex;

/// Per-chunk provenance, kept in lockstep with the index's row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: PathBuf,
}

/// One nearest-neighbor hit with its attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub source: PathBuf,
    pub score: f32,
}

// The index structure and the side tables serialize separately: the index
// artifact is backend-native binary, the sidecar carries everything needed
// to re-attach it on load.
#[derive(Debug, Serialize)]
struct SidecarRef<'a> {
    dimension: usize,
    texts: &'a [String],
    metadatas: &'a [ChunkMetadata],
}

#[derive(Debug, Deserialize)]
struct Sidecar {
    dimension: usize,
    texts: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
}

struct StoreState {
    index: FlatIndex,
    texts: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
}

struct BatchProgress {
    committed_chunks: usize,
    committed_batches: usize,
    total_chunks: usize,
    total_batches: usize,
}

impl BatchProgress {
    fn new(total_chunks: usize, total_batches: usize) -> Self {
        Self {
            committed_chunks: 0,
            committed_batches: 0,
            total_chunks,
            total_batches,
        }
    }

    fn failure(&self, source: anyhow::Error) -> KbError {
        warn!(
            "embedding batch {} of {} failed; {} of {} chunks committed so far",
            self.committed_batches + 1,
            self.total_batches,
            self.committed_chunks,
            self.total_chunks
        );
        KbError::ProviderBatchFailure {
            committed_chunks: self.committed_chunks,
            total_chunks: self.total_chunks,
            committed_batches: self.committed_batches,
            total_batches: self.total_batches,
            source,
        }
    }
}

/// Owns one index plus the parallel chunk-text and metadata tables, and
/// drives chunking, batched embedding, and persistence.
///
/// Build a new store with [`VectorStore::create`], grow it with
/// [`VectorStore::extend`], and persist it explicitly with
/// [`VectorStore::save`]. The three tables are always extended together,
/// only at batch boundaries, so `texts.len() == metadatas.len() ==
/// index.len()` holds whenever a call returns.
pub struct VectorStore {
    chunker: Chunker,
    provider: Box<dyn EmbeddingProvider>,
    batch_size: usize,
    store_path: PathBuf,
    index_path: PathBuf,
    state: Option<StoreState>,
}

impl VectorStore {
    pub fn new(settings: &StoreSettings) -> Result<Self> {
        let provider = resolve_provider(settings.model_type)?;
        Ok(Self::with_provider(settings, provider))
    }

    /// Construct with an explicit provider capability. [`VectorStore::new`]
    /// resolves one from the configured model type.
    pub fn with_provider(
        settings: &StoreSettings,
        provider: Box<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            chunker: Chunker::new(settings.chunk_size, settings.separator.clone()),
            provider,
            batch_size: settings.batch_size,
            store_path: settings.store_path(),
            index_path: settings.index_path(),
            state: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn vector_count(&self) -> usize {
        self.state.as_ref().map_or(0, |state| state.index.len())
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Build a fresh index from `documents`.
    ///
    /// Chunks all documents in input order, embeds in batches, and keeps
    /// the result in memory; call [`VectorStore::save`] to persist it. The
    /// first batch initializes the index, every later batch appends. On a
    /// provider failure the store keeps the batches that succeeded and the
    /// error reports exact progress.
    pub fn create(&mut self, documents: &[Document]) -> Result<()> {
        if self.state.is_some() {
            return Err(KbError::AlreadyInitialized);
        }

        let (texts, metadatas) = self.chunk_documents(documents);
        let total_chunks = texts.len();
        info!(
            "building vector store from {} documents ({} chunks)",
            documents.len(),
            total_chunks
        );

        if total_chunks == 0 {
            warn!("no chunks produced; creating an empty store");
            self.state = Some(StoreState {
                index: FlatIndex::new(self.provider.dimension()),
                texts: Vec::new(),
                metadatas: Vec::new(),
            });
            return Ok(());
        }

        let total_batches = total_chunks.div_ceil(self.batch_size);
        let mut progress = BatchProgress::new(total_chunks, total_batches);

        // First batch initializes the index backend.
        let first_end = self.batch_size.min(total_chunks);
        debug!("initializing index from first batch of {} chunks", first_end);
        let vectors = self
            .provider
            .embed_batch(&texts[..first_end])
            .map_err(|source| progress.failure(source))?;
        if vectors.len() != first_end {
            return Err(progress.failure(anyhow!(
                "provider returned {} vectors for a batch of {}",
                vectors.len(),
                first_end
            )));
        }
        let index = FlatIndex::from_batch(vectors)?;
        self.state = Some(StoreState {
            index,
            texts: texts[..first_end].to_vec(),
            metadatas: metadatas[..first_end].to_vec(),
        });
        progress.committed_chunks = first_end;
        progress.committed_batches = 1;

        self.append_batches(&texts[first_end..], &metadatas[first_end..], &mut progress)?;

        info!("initialized vector store with {} vectors", self.vector_count());
        Ok(())
    }

    /// Append `documents` to an existing store.
    ///
    /// When nothing is initialized in memory this falls back to loading the
    /// persisted store from the configured path; a missing persisted store
    /// surfaces [`KbError::StoreNotFound`]. The caller persists the result
    /// with [`VectorStore::save`] when it wants the changes kept.
    pub fn extend(&mut self, documents: &[Document]) -> Result<()> {
        if self.state.is_none() {
            info!(
                "store not initialized; falling back to loading {:?}",
                self.store_path
            );
            self.load()?;
        }

        let (texts, metadatas) = self.chunk_documents(documents);
        let total_chunks = texts.len();
        let mut progress =
            BatchProgress::new(total_chunks, total_chunks.div_ceil(self.batch_size));

        self.append_batches(&texts, &metadatas, &mut progress)?;

        info!(
            "extended vector store by {} chunks ({} total); save() to keep the changes",
            total_chunks,
            self.vector_count()
        );
        Ok(())
    }

    /// Persist the index artifact and the sidecar under the cache dir.
    /// Callable any number of times; the last save wins.
    pub fn save(&self) -> Result<()> {
        let state = self.state.as_ref().ok_or(KbError::NotInitialized)?;

        state.index.write_to(&self.index_path)?;

        let sidecar = SidecarRef {
            dimension: state.index.dimension(),
            texts: &state.texts,
            metadatas: &state.metadatas,
        };
        let json =
            serde_json::to_string(&sidecar).context("failed to serialize store sidecar")?;
        fs::write(&self.store_path, json)?;

        info!(
            "saved vector store to {:?} and {:?}",
            self.store_path, self.index_path
        );
        Ok(())
    }

    /// Reconstruct the in-memory store from the two on-disk artifacts,
    /// restoring the metadata-table ordering of the last save. Never
    /// synthesizes a partial store: both artifacts must exist and agree.
    pub fn load(&mut self) -> Result<()> {
        for path in [&self.store_path, &self.index_path] {
            if !path.exists() {
                return Err(KbError::StoreNotFound {
                    missing: path.clone(),
                });
            }
        }

        info!("loading vector store from {:?}", self.store_path);
        let json = fs::read_to_string(&self.store_path)?;
        let sidecar: Sidecar =
            serde_json::from_str(&json).context("failed to parse store sidecar")?;
        let index = FlatIndex::read_from(&self.index_path)?;

        if sidecar.texts.len() != sidecar.metadatas.len()
            || sidecar.texts.len() != index.len()
        {
            return Err(KbError::CorruptStore(format!(
                "row counts disagree: {} texts, {} metadata rows, {} vectors",
                sidecar.texts.len(),
                sidecar.metadatas.len(),
                index.len()
            )));
        }
        if index.dimension() != sidecar.dimension {
            return Err(KbError::CorruptStore(format!(
                "dimension disagrees: sidecar says {}, index says {}",
                sidecar.dimension,
                index.dimension()
            )));
        }

        self.state = Some(StoreState {
            index,
            texts: sidecar.texts,
            metadatas: sidecar.metadatas,
        });
        info!("loaded {} vectors", self.vector_count());
        Ok(())
    }

    /// Embed `query` and return the nearest chunks with their attribution.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let state = self.state.as_ref().ok_or(KbError::NotInitialized)?;

        let query_vector = self
            .provider
            .embed_batch(std::slice::from_ref(&query.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("provider returned no vector for the query"))?;

        let neighbors = state.index.search(&query_vector, limit)?;
        Ok(neighbors
            .into_iter()
            .map(|(row, score)| SearchHit {
                text: state.texts[row].clone(),
                source: state.metadatas[row].source.clone(),
                score,
            })
            .collect())
    }

    fn chunk_documents(&self, documents: &[Document]) -> (Vec<String>, Vec<ChunkMetadata>) {
        let mut texts = Vec::new();
        let mut metadatas = Vec::new();
        for doc in documents {
            let splits = self.chunker.split(&doc.text);
            metadatas.extend(splits.iter().map(|_| ChunkMetadata {
                source: doc.source.clone(),
            }));
            texts.extend(splits);
        }
        debug!(
            "chunked {} documents into {} chunks",
            documents.len(),
            texts.len()
        );
        (texts, metadatas)
    }

    // The cursor over `texts` advances only after a batch fully succeeds,
    // so retrying the uncommitted remainder never duplicates rows.
    fn append_batches(
        &mut self,
        texts: &[String],
        metadatas: &[ChunkMetadata],
        progress: &mut BatchProgress,
    ) -> Result<()> {
        debug_assert_eq!(texts.len(), metadatas.len());

        let mut cursor = 0;
        while cursor < texts.len() {
            let end = (cursor + self.batch_size).min(texts.len());
            let batch = &texts[cursor..end];
            debug!(
                "embedding batch {} of {} ({} chunks)",
                progress.committed_batches + 1,
                progress.total_batches,
                batch.len()
            );

            let vectors = self
                .provider
                .embed_batch(batch)
                .map_err(|source| progress.failure(source))?;
            if vectors.len() != batch.len() {
                return Err(progress.failure(anyhow!(
                    "provider returned {} vectors for a batch of {}",
                    vectors.len(),
                    batch.len()
                )));
            }

            let state = self.state.as_mut().ok_or(KbError::NotInitialized)?;
            state.index.append(vectors)?;
            state.texts.extend_from_slice(batch);
            state.metadatas.extend_from_slice(&metadatas[cursor..end]);

            progress.committed_chunks += batch.len();
            progress.committed_batches += 1;
            cursor = end;
        }
        Ok(())
    }
}
