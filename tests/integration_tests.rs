#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end tests for the ingestion and retrieval pipeline, hermetic by
// construction: a deterministic bag-of-words embedder stands in for the
// embedding server and a canned client for the completion collaborator.

use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use qagen::QagenError;
use qagen::chunking::{Chunker, ChunkingConfig};
use qagen::embeddings::Embedder;
use qagen::extractor::{DocType, ExtractedDocument};
use qagen::generation::{CompletionClient, TestCaseGenerator};
use qagen::pipeline::{IngestionPipeline, IngestionStatus};
use qagen::retrieval::RetrievalEngine;
use qagen::store::{MemoryStore, VectorStore};
use tempfile::TempDir;

const DIMENSION: usize = 384;

/// Deterministic embedder: every token increments a hashed bucket, so texts
/// sharing vocabulary land near each other under cosine distance.
struct HashEmbedder;

impl Embedder for HashEmbedder {
    fn embed(&self, texts: &[String]) -> qagen::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; DIMENSION];
                for token in text.to_lowercase().split_whitespace() {
                    let token = token.trim_matches(|c: char| !c.is_alphanumeric());
                    if token.is_empty() {
                        continue;
                    }
                    let mut hasher = DefaultHasher::new();
                    token.hash(&mut hasher);
                    let bucket = (hasher.finish() % DIMENSION as u64) as usize;
                    vector[bucket] += 1.0;
                }
                vector
            })
            .collect())
    }

    fn model_id(&self) -> &str {
        "hash-embedder"
    }
}

fn pipeline(chunk_size: usize, chunk_overlap: usize) -> (IngestionPipeline, Arc<dyn Embedder>) {
    let chunker = Chunker::new(&ChunkingConfig {
        chunk_size,
        chunk_overlap,
    })
    .expect("valid chunker config");
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder);
    (
        IngestionPipeline::new(chunker, Arc::clone(&embedder)),
        embedder,
    )
}

fn document(filename: &str, text: &str) -> ExtractedDocument {
    ExtractedDocument {
        filename: filename.to_string(),
        doc_type: DocType::Text,
        text: text.to_string(),
        selectors: None,
    }
}

#[tokio::test]
async fn ingest_then_retrieve_round_trip() {
    let (pipeline, embedder) = pipeline(20, 5);
    let mut store = MemoryStore::new();

    let report = pipeline
        .ingest(
            &mut store,
            &[document(
                "fox.txt",
                "The quick brown fox jumps over the lazy dog.",
            )],
        )
        .await;

    assert_eq!(report.status, IngestionStatus::Success);
    assert_eq!(report.document_count, 1);
    assert!(report.chunk_count >= 2, "expected at least two chunks");
    assert_eq!(
        store.count().await.expect("count succeeds"),
        report.chunk_count as u64
    );

    let engine = RetrievalEngine::new(embedder);
    let results = engine
        .retrieve(&store, "fox", 10)
        .await
        .expect("retrieve succeeds");

    assert!(!results.is_empty());
    assert_eq!(results[0].metadata.filename, "fox.txt");

    // Every stored chunk respects the configured size limit and the indices
    // are contiguous from zero.
    let mut indices = BTreeSet::new();
    for result in &results {
        assert!(result.content.chars().count() <= 20);
        indices.insert(result.metadata.chunk_index);
    }
    let expected: BTreeSet<u32> = (0..report.chunk_count as u32).collect();
    assert_eq!(indices, expected);
}

#[tokio::test]
async fn ingesting_zero_documents_reports_error() {
    let (pipeline, _) = pipeline(500, 50);
    let mut store = MemoryStore::new();

    let report = pipeline.ingest(&mut store, &[]).await;

    assert_eq!(report.status, IngestionStatus::Error);
    assert_eq!(report.message, "no valid documents to process");
    assert_eq!(store.count().await.expect("count succeeds"), 0);
}

#[tokio::test]
async fn mismatched_query_dimension_is_rejected() {
    let (pipeline, _) = pipeline(500, 50);
    let mut store = MemoryStore::new();

    let report = pipeline
        .ingest(
            &mut store,
            &[document("doc.txt", "Stored vectors use the full dimension.")],
        )
        .await;
    assert_eq!(report.status, IngestionStatus::Success);

    let result = store.search(&vec![0.0f32; 128], 5).await;
    assert!(matches!(
        result,
        Err(QagenError::DimensionMismatch {
            expected: 384,
            actual: 128
        })
    ));
}

#[tokio::test]
async fn rebuild_replaces_the_whole_knowledge_base() {
    let (pipeline, embedder) = pipeline(500, 50);
    let mut store = MemoryStore::new();

    let report = pipeline
        .ingest(
            &mut store,
            &[document("old.txt", "Legacy billing flow documentation.")],
        )
        .await;
    assert_eq!(report.status, IngestionStatus::Success);

    // Clear-then-build, as the CLI does on every rebuild.
    store.delete_all().await.expect("delete succeeds");
    let report = pipeline
        .ingest(
            &mut store,
            &[document("new.txt", "Current billing flow documentation.")],
        )
        .await;
    assert_eq!(report.status, IngestionStatus::Success);

    let engine = RetrievalEngine::new(embedder);
    let results = engine
        .retrieve(&store, "billing flow documentation", 10)
        .await
        .expect("retrieve succeeds");

    assert!(!results.is_empty());
    for result in &results {
        assert_eq!(result.metadata.filename, "new.txt");
    }
}

#[tokio::test]
async fn snapshot_survives_a_store_restart() {
    let temp_dir = TempDir::new().expect("temp dir");
    let snapshot = temp_dir.path().join("store.json");

    let (pipeline, embedder) = pipeline(500, 50);
    let mut store = MemoryStore::new();
    let report = pipeline
        .ingest(
            &mut store,
            &[document("manual.txt", "Refunds are issued within five days.")],
        )
        .await;
    assert_eq!(report.status, IngestionStatus::Success);
    store.persist(&snapshot).await.expect("persist succeeds");

    let mut reopened = MemoryStore::new();
    reopened.restore(&snapshot).await.expect("restore succeeds");

    let engine = RetrievalEngine::new(embedder);
    let results = engine
        .retrieve(&reopened, "refunds", 5)
        .await
        .expect("retrieve succeeds");

    assert!(!results.is_empty());
    assert_eq!(results[0].metadata.filename, "manual.txt");
}

#[tokio::test]
async fn delete_all_then_search_is_empty_for_any_k() {
    let (pipeline, embedder) = pipeline(500, 50);
    let mut store = MemoryStore::new();

    let report = pipeline
        .ingest(&mut store, &[document("doc.txt", "Some indexed content.")])
        .await;
    assert_eq!(report.status, IngestionStatus::Success);

    store.delete_all().await.expect("first delete succeeds");
    store.delete_all().await.expect("second delete succeeds");

    let engine = RetrievalEngine::new(embedder);
    for k in [1usize, 5, 50] {
        let results = engine
            .retrieve(&store, "content", k)
            .await
            .expect("retrieve succeeds");
        assert!(results.is_empty());
    }
}

#[tokio::test]
async fn retrieved_context_feeds_test_case_generation() {
    struct CannedClient;

    impl CompletionClient for CannedClient {
        fn complete(&self, _system: &str, _prompt: &str) -> qagen::Result<String> {
            Ok(r#"```json
[
  {
    "test_id": "TC-001",
    "feature": "Login",
    "test_scenario": "Signing in with valid credentials",
    "expected_result": "User lands on the dashboard",
    "grounded_in": ["auth.txt"]
  }
]
```"#
                .to_string())
        }
    }

    let (pipeline, embedder) = pipeline(500, 50);
    let mut store = MemoryStore::new();

    let report = pipeline
        .ingest(
            &mut store,
            &[document(
                "auth.txt",
                "Users sign in with an email address and password. \
                 Valid credentials open the dashboard.",
            )],
        )
        .await;
    assert_eq!(report.status, IngestionStatus::Success);

    let engine = RetrievalEngine::new(embedder);
    let context = engine
        .retrieve(&store, "sign in with credentials", 5)
        .await
        .expect("retrieve succeeds");
    assert!(!context.is_empty());

    let generator = TestCaseGenerator::new(Arc::new(CannedClient));
    let cases = generator.generate("how does login work", &context);

    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].test_id, "TC-001");
    assert_eq!(cases[0].grounded_in, vec!["auth.txt".to_string()]);
}
