use super::*;
use crate::config::ModelType;
use crate::embeddings::EmbeddingProvider;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const TEST_DIMENSION: usize = 8;

/// Deterministic stand-in for a real provider: the vector depends only on
/// the text, so batched and unbatched runs are comparable.
struct FakeEmbedder {
    dimension: usize,
    fail_on_batch: Option<usize>,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    fn new() -> Self {
        Self {
            dimension: TEST_DIMENSION,
            fail_on_batch: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_on_batch(batch: usize) -> Self {
        Self {
            fail_on_batch: Some(batch),
            ..Self::new()
        }
    }
}

fn embed_text(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.1f32; dimension];
    for (i, byte) in text.bytes().enumerate() {
        vector[i % dimension] += f32::from(byte) / 255.0;
    }
    vector
}

impl EmbeddingProvider for FakeEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_batch == Some(call) {
            anyhow::bail!("simulated provider outage");
        }
        Ok(texts
            .iter()
            .map(|text| embed_text(text, self.dimension))
            .collect())
    }
}

fn test_settings(cache_dir: &Path) -> StoreSettings {
    StoreSettings::with_cache_dir(1500, "\n", "vectorstore.json", ModelType::OpenAi, cache_dir)
        .expect("settings should validate")
}

fn test_store(settings: &StoreSettings) -> VectorStore {
    VectorStore::with_provider(settings, Box::new(FakeEmbedder::new()))
}

fn numbered_documents(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| Document {
            text: format!("note number {i} about topic {}", i % 7),
            source: PathBuf::from(format!("notes/note-{i}.md")),
        })
        .collect()
}

fn assert_row_counts_agree(store: &VectorStore) {
    let state = store.state.as_ref().expect("store should be initialized");
    assert_eq!(state.texts.len(), state.metadatas.len());
    assert_eq!(state.texts.len(), state.index.len());
}

#[test]
fn create_twice_fails() {
    let temp_dir = TempDir::new().expect("tempdir");
    let settings = test_settings(temp_dir.path());
    let mut store = test_store(&settings);

    store
        .create(&numbered_documents(3))
        .expect("create should succeed");
    let result = store.create(&numbered_documents(3));
    assert!(matches!(result, Err(KbError::AlreadyInitialized)));
    // The first build is untouched.
    assert_eq!(store.vector_count(), 3);
}

#[test]
fn save_before_create_fails() {
    let temp_dir = TempDir::new().expect("tempdir");
    let settings = test_settings(temp_dir.path());
    let store = test_store(&settings);

    assert!(matches!(store.save(), Err(KbError::NotInitialized)));
}

#[test]
fn search_before_create_fails() {
    let temp_dir = TempDir::new().expect("tempdir");
    let settings = test_settings(temp_dir.path());
    let store = test_store(&settings);

    assert!(matches!(
        store.search("anything", 3),
        Err(KbError::NotInitialized)
    ));
}

#[test]
fn oversized_document_becomes_one_chunk() {
    let temp_dir = TempDir::new().expect("tempdir");
    let settings = test_settings(temp_dir.path());
    let mut store = test_store(&settings);

    let documents = vec![Document {
        text: "a".repeat(2000),
        source: PathBuf::from("f1.md"),
    }];
    store.create(&documents).expect("create should succeed");

    assert_eq!(store.vector_count(), 1);
    let state = store.state.as_ref().expect("initialized");
    assert_eq!(state.texts[0].len(), 2000);
    assert_eq!(state.metadatas[0].source, PathBuf::from("f1.md"));
}

#[test]
fn empty_document_set_builds_empty_store() {
    let temp_dir = TempDir::new().expect("tempdir");
    let settings = test_settings(temp_dir.path());
    let mut store = test_store(&settings);

    store.create(&[]).expect("create should succeed");
    assert_eq!(store.vector_count(), 0);
    assert_row_counts_agree(&store);

    // An empty store still persists and reloads.
    store.save().expect("save should succeed");
    let mut reloaded = test_store(&settings);
    reloaded.load().expect("load should succeed");
    assert_eq!(reloaded.vector_count(), 0);
}

#[test]
fn row_counts_agree_after_create_and_extends() {
    let temp_dir = TempDir::new().expect("tempdir");
    let settings = test_settings(temp_dir.path());
    let mut store = test_store(&settings);

    store
        .create(&numbered_documents(130))
        .expect("create should succeed");
    assert_row_counts_agree(&store);

    store
        .extend(&numbered_documents(10))
        .expect("extend should succeed");
    assert_row_counts_agree(&store);

    store.extend(&[]).expect("extend of nothing should succeed");
    assert_row_counts_agree(&store);
    assert_eq!(store.vector_count(), 140);
}

#[test]
fn metadata_tracks_originating_document() {
    let temp_dir = TempDir::new().expect("tempdir");
    let settings = test_settings(temp_dir.path());
    let mut store = test_store(&settings);

    let documents = vec![
        Document {
            text: "alpha\nbeta".to_string(),
            source: PathBuf::from("a.md"),
        },
        Document {
            text: "x".repeat(1600) + "\n" + &"y".repeat(1600),
            source: PathBuf::from("b.md"),
        },
    ];
    store.create(&documents).expect("create should succeed");

    let state = store.state.as_ref().expect("initialized");
    assert_eq!(state.metadatas[0].source, PathBuf::from("a.md"));
    // The second document splits into two oversized chunks, both tagged b.md.
    assert_eq!(state.index.len(), 3);
    assert_eq!(state.metadatas[1].source, PathBuf::from("b.md"));
    assert_eq!(state.metadatas[2].source, PathBuf::from("b.md"));
}

#[test]
fn provider_count_mismatch_is_reported_as_batch_failure() {
    struct ShortEmbedder;
    impl EmbeddingProvider for ShortEmbedder {
        fn dimension(&self) -> usize {
            TEST_DIMENSION
        }
        fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            // One vector short.
            Ok(texts
                .iter()
                .skip(1)
                .map(|text| embed_text(text, TEST_DIMENSION))
                .collect())
        }
    }

    let temp_dir = TempDir::new().expect("tempdir");
    let settings = test_settings(temp_dir.path());
    let mut store = VectorStore::with_provider(&settings, Box::new(ShortEmbedder));

    let result = store.create(&numbered_documents(5));
    assert!(matches!(
        result,
        Err(KbError::ProviderBatchFailure {
            committed_chunks: 0,
            ..
        })
    ));
}

#[test]
fn load_rejects_disagreeing_artifacts() {
    let temp_dir = TempDir::new().expect("tempdir");
    let settings = test_settings(temp_dir.path());
    let mut store = test_store(&settings);

    store
        .create(&numbered_documents(4))
        .expect("create should succeed");
    store.save().expect("save should succeed");

    // Drop one row from the sidecar while leaving the index alone.
    let json = fs::read_to_string(settings.store_path()).expect("read sidecar");
    let mut sidecar: serde_json::Value = serde_json::from_str(&json).expect("parse sidecar");
    sidecar["texts"]
        .as_array_mut()
        .expect("texts array")
        .pop();
    sidecar["metadatas"]
        .as_array_mut()
        .expect("metadatas array")
        .pop();
    fs::write(
        settings.store_path(),
        serde_json::to_string(&sidecar).expect("serialize sidecar"),
    )
    .expect("write sidecar");

    let mut reloaded = test_store(&settings);
    assert!(matches!(reloaded.load(), Err(KbError::CorruptStore(_))));
    assert!(!reloaded.is_initialized());
}
