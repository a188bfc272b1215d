use super::*;
use crate::store::Chunk;
use crate::test_support::{FAKE_DIMENSION, FakeEmbedder};
use std::sync::atomic::Ordering;
use tempfile::TempDir;

fn sample_store() -> ChunkStore {
    ChunkStore::new(vec![
        Chunk::new(
            "2022 World Cup",
            "https://example.com/wc2022",
            "Argentina won the 2022 World Cup final against France on penalties.",
        ),
        Chunk::new(
            "Ballon d'Or",
            "https://example.com/ballon",
            "Lionel Messi has won the Ballon d'Or a record eight times.",
        ),
        Chunk::new(
            "Premier League",
            "https://example.com/epl",
            "Manchester City won four consecutive Premier League titles.",
        ),
    ])
}

fn test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::with_base_dir(temp_dir.path());
    config.ollama.batch_size = 2;
    (config, temp_dir)
}

#[tokio::test]
async fn build_indexes_every_chunk_in_order() {
    let (config, _temp_dir) = test_config();
    let embedder = FakeEmbedder::new();
    let store = sample_store();

    let report = Indexer::new(&config, &embedder)
        .build(&store)
        .await
        .expect("index build should succeed");

    assert_eq!(report.vector_count, 3);
    assert_eq!(report.dimension, FAKE_DIMENSION);
    assert_eq!(report.embedding_model, "fake-embedder");
    // Batch size 2 over 3 chunks
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

    let vector_store = VectorStore::open(&config.vector_database_path())
        .await
        .expect("index should exist");
    let entries = vector_store.entries().await.expect("should list entries");
    let expected: Vec<(String, usize)> = store
        .iter()
        .enumerate()
        .map(|(position, chunk)| (chunk.id.clone(), position))
        .collect();
    assert_eq!(entries, expected);

    let report = ConsistencyReport::check(&store, &vector_store)
        .await
        .expect("consistency check should run");
    assert!(report.is_consistent, "{}", report.summary());
}

#[tokio::test]
async fn build_writes_manifest() {
    let (config, _temp_dir) = test_config();
    let embedder = FakeEmbedder::named("all-minilm:latest");

    Indexer::new(&config, &embedder)
        .build(&sample_store())
        .await
        .expect("index build should succeed");

    let manifest =
        IndexManifest::load(config.index_manifest_path()).expect("manifest should be written");
    assert_eq!(manifest.embedding_model, "all-minilm:latest");
    assert_eq!(manifest.dimension, FAKE_DIMENSION);
    assert_eq!(manifest.vector_count, 3);
}

#[tokio::test]
async fn empty_store_is_rejected() {
    let (config, _temp_dir) = test_config();
    let embedder = FakeEmbedder::new();

    let result = Indexer::new(&config, &embedder)
        .build(&ChunkStore::new(Vec::new()))
        .await;

    assert!(matches!(result, Err(QaError::EmptyChunkStore)));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn embedding_failure_leaves_no_manifest() {
    let (config, _temp_dir) = test_config();

    Indexer::new(&config, &FakeEmbedder::new())
        .build(&sample_store())
        .await
        .expect("first build should succeed");
    assert!(config.index_manifest_path().exists());

    let result = Indexer::new(&config, &FakeEmbedder::failing())
        .build(&sample_store())
        .await;

    assert!(matches!(result, Err(QaError::Embedding(_))));
    assert!(!config.index_manifest_path().exists());
}

#[tokio::test]
async fn rebuild_follows_changed_store() {
    let (config, _temp_dir) = test_config();
    let embedder = FakeEmbedder::new();

    Indexer::new(&config, &embedder)
        .build(&sample_store())
        .await
        .expect("first build should succeed");

    let smaller = ChunkStore::new(vec![Chunk::new("Only", "https://example.com", "One chunk")]);
    let report = Indexer::new(&config, &embedder)
        .build(&smaller)
        .await
        .expect("rebuild should succeed");

    assert_eq!(report.vector_count, 1);
}

#[test]
fn ragged_vectors_are_rejected() {
    let vectors = vec![vec![1.0, 2.0], vec![1.0]];
    assert!(matches!(
        uniform_dimension(&vectors),
        Err(QaError::Embedding(_))
    ));
    assert_eq!(uniform_dimension(&[vec![0.5; 4]]).expect("uniform"), 4);
}
