use super::*;
use crate::KbError;
use tempfile::TempDir;

fn test_vector(seed: usize, dimension: usize) -> Vec<f32> {
    (0..dimension)
        .map(|i| ((seed * 31 + i * 7) % 101) as f32 / 101.0 + 0.01)
        .collect()
}

#[test]
fn add_and_search() {
    let mut index = FlatIndex::new(3);
    index
        .append(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![0.0, 1.0, 0.0],
        ])
        .expect("append should succeed");

    assert_eq!(index.len(), 3);

    let results = index.search(&[1.0, 0.0, 0.0], 2).expect("search should succeed");
    assert_eq!(results.len(), 2);

    // Exact match first, near match second.
    assert_eq!(results[0].0, 0);
    assert!((results[0].1 - 1.0).abs() < 1e-6);
    assert_eq!(results[1].0, 1);
    assert!(results[1].1 > 0.9);
}

#[test]
fn from_batch_takes_dimension_from_vectors() {
    let index = FlatIndex::from_batch(vec![test_vector(0, 8), test_vector(1, 8)])
        .expect("from_batch should succeed");
    assert_eq!(index.dimension(), 8);
    assert_eq!(index.len(), 2);
}

#[test]
fn from_batch_rejects_empty_batch() {
    let result = FlatIndex::from_batch(Vec::new());
    assert!(matches!(result, Err(KbError::CorruptStore(_))));
}

#[test]
fn dimension_mismatch_on_append_and_search() {
    let mut index = FlatIndex::new(3);
    let result = index.append(vec![vec![1.0, 0.0]]);
    assert!(matches!(
        result,
        Err(KbError::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));

    index
        .append(vec![vec![1.0, 0.0, 0.0]])
        .expect("append should succeed");
    let result = index.search(&[1.0, 0.0], 1);
    assert!(matches!(result, Err(KbError::DimensionMismatch { .. })));
}

#[test]
fn mismatched_append_leaves_index_unchanged() {
    let mut index = FlatIndex::new(2);
    index
        .append(vec![vec![0.5, 0.5]])
        .expect("append should succeed");
    let result = index.append(vec![vec![0.1, 0.2], vec![0.1, 0.2, 0.3]]);
    assert!(result.is_err());
    assert_eq!(index.len(), 1);
}

#[test]
fn search_on_empty_index_returns_nothing() {
    let index = FlatIndex::new(4);
    let results = index
        .search(&test_vector(0, 4), 10)
        .expect("search should succeed");
    assert!(results.is_empty());
}

#[test]
fn serialization_roundtrip_answers_identically() {
    let temp_dir = TempDir::new().expect("tempdir");
    let path = temp_dir.path().join("test.index");
    let dimension = 16;

    // Boundary-straddling sizes relative to a batch size of 100.
    for n in [0usize, 1, 100, 101, 250] {
        let mut index = FlatIndex::new(dimension);
        index
            .append((0..n).map(|i| test_vector(i, dimension)).collect())
            .expect("append should succeed");

        index.write_to(&path).expect("write should succeed");
        let reloaded = FlatIndex::read_from(&path).expect("read should succeed");

        assert_eq!(reloaded.len(), n);
        assert_eq!(reloaded.dimension(), dimension);

        let query = test_vector(7, dimension);
        let before = index.search(&query, 10).expect("search should succeed");
        let after = reloaded.search(&query, 10).expect("search should succeed");
        assert_eq!(before, after, "roundtrip changed results for n = {n}");
    }
}

#[test]
fn cosine_similarity_of_zero_vector_is_zero() {
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
}

#[test]
fn search_truncates_to_k() {
    let mut index = FlatIndex::new(4);
    index
        .append((0..20).map(|i| test_vector(i, 4)).collect())
        .expect("append should succeed");
    let results = index
        .search(&test_vector(3, 4), 5)
        .expect("search should succeed");
    assert_eq!(results.len(), 5);
    // Scores come back descending.
    for pair in results.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }
}
