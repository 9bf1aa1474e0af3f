use super::*;
use crate::documents::Document;
use crate::embeddings::chunking::ChunkingConfig;
use crate::index::VectorIndex;
use tempfile::TempDir;

struct StaticSource {
    documents: Vec<Document>,
}

impl DocumentSource for StaticSource {
    fn load(&self) -> crate::Result<Vec<Document>> {
        Ok(self.documents.clone())
    }
}

/// Embeds text as letter-frequency counts over a small fixed alphabet.
/// Deterministic and dimension-stable, which is all the indexer needs.
struct LetterCountEmbedder;

impl EmbeddingProvider for LetterCountEmbedder {
    fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        let mut vector = vec![0.0f32; 4];
        for c in text.chars() {
            match c.to_ascii_lowercase() {
                'a' => vector[0] += 1.0,
                'e' => vector[1] += 1.0,
                'i' => vector[2] += 1.0,
                'o' => vector[3] += 1.0,
                _ => {}
            }
        }
        // Avoid the zero vector; cosine distance needs a magnitude.
        vector[0] += 0.01;
        Ok(vector)
    }
}

struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed(&self, _text: &str) -> crate::Result<Vec<f32>> {
        Err(RagError::Embedding("embedding endpoint unavailable".to_string()))
    }
}

struct RaggedEmbedder;

impl EmbeddingProvider for RaggedEmbedder {
    fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        // Dimension varies with input length, which the indexer must reject.
        Ok(vec![1.0; 2 + text.len() % 2])
    }
}

fn doc(path: &str, text: &str) -> Document {
    Document {
        id: path.to_string(),
        raw_text: text.to_string(),
        source_path: path.to_string(),
    }
}

fn builder(documents: Vec<Document>, embedder: Arc<dyn EmbeddingProvider>) -> IndexBuilder {
    IndexBuilder::new(
        Box::new(StaticSource { documents }),
        embedder,
        ChunkingConfig::default(),
    )
}

#[tokio::test]
async fn rebuild_reports_document_and_chunk_counts() {
    let temp = TempDir::new().expect("should create temp dir");
    let path = temp.path().join("index");

    let documents = vec![
        doc("a.md", "Intro: Alice likes apples."),
        doc("b.md", "Intro: Bob likes oranges."),
    ];
    let builder = builder(documents, Arc::new(LetterCountEmbedder));

    let summary = builder.rebuild(&path).await.expect("rebuild should succeed");

    assert_eq!(summary.documents, 2);
    assert_eq!(summary.chunks, 2);

    let index = VectorIndex::open(&path).await.expect("open should succeed");
    assert_eq!(
        index.count_entries().await.expect("count should succeed"),
        2
    );
}

#[tokio::test]
async fn rebuild_with_empty_source_builds_empty_index() {
    let temp = TempDir::new().expect("should create temp dir");
    let path = temp.path().join("index");

    let builder = builder(Vec::new(), Arc::new(LetterCountEmbedder));
    let summary = builder.rebuild(&path).await.expect("rebuild should succeed");

    assert_eq!(summary.documents, 0);
    assert_eq!(summary.chunks, 0);

    let index = VectorIndex::open(&path).await.expect("open should succeed");
    assert_eq!(
        index.count_entries().await.expect("count should succeed"),
        0
    );
}

#[tokio::test]
async fn embedding_failure_aborts_without_persisting() {
    let temp = TempDir::new().expect("should create temp dir");
    let path = temp.path().join("index");

    let documents = vec![doc("a.md", "some content")];
    let builder = builder(documents, Arc::new(FailingEmbedder));

    let error = builder.rebuild(&path).await.expect_err("rebuild should fail");
    assert!(matches!(error, RagError::Embedding(_)));

    // Nothing was persisted; the index cannot be opened.
    let open_error = VectorIndex::open(&path)
        .await
        .expect_err("open should fail");
    assert!(matches!(open_error, RagError::NotFound(_)));
}

#[tokio::test]
async fn embedding_failure_leaves_previous_index_intact() {
    let temp = TempDir::new().expect("should create temp dir");
    let path = temp.path().join("index");

    let good = builder(
        vec![doc("a.md", "Alice likes apples.")],
        Arc::new(LetterCountEmbedder),
    );
    good.rebuild(&path).await.expect("first rebuild should succeed");

    let bad = builder(vec![doc("b.md", "Bob")], Arc::new(FailingEmbedder));
    let error = bad.rebuild(&path).await.expect_err("rebuild should fail");
    assert!(matches!(error, RagError::Embedding(_)));

    // The earlier index is still queryable.
    let index = VectorIndex::open(&path).await.expect("open should succeed");
    assert_eq!(
        index.count_entries().await.expect("count should succeed"),
        1
    );
}

#[tokio::test]
async fn inconsistent_embedding_dimensions_rejected() {
    let temp = TempDir::new().expect("should create temp dir");
    let path = temp.path().join("index");

    let documents = vec![doc("a.md", "ab"), doc("b.md", "abc")];
    let builder = builder(documents, Arc::new(RaggedEmbedder));

    let error = builder.rebuild(&path).await.expect_err("rebuild should fail");
    assert!(matches!(error, RagError::Embedding(_)));
}

#[tokio::test]
async fn rebuild_twice_yields_equivalent_ranking() {
    let temp = TempDir::new().expect("should create temp dir");
    let path = temp.path().join("index");

    let documents = vec![
        doc("a.md", "Alice likes apples."),
        doc("b.md", "Bob likes oranges."),
    ];

    let builder = builder(documents, Arc::new(LetterCountEmbedder));
    builder.rebuild(&path).await.expect("first rebuild should succeed");

    let query = LetterCountEmbedder
        .embed("apples")
        .expect("embed should succeed");

    let index = VectorIndex::open(&path).await.expect("open should succeed");
    let first: Vec<String> = index
        .search(&query, 3)
        .await
        .expect("search should succeed")
        .into_iter()
        .map(|r| r.chunk.source_path)
        .collect();

    builder.rebuild(&path).await.expect("second rebuild should succeed");

    let index = VectorIndex::open(&path).await.expect("open should succeed");
    let second: Vec<String> = index
        .search(&query, 3)
        .await
        .expect("search should succeed")
        .into_iter()
        .map(|r| r.chunk.source_path)
        .collect();

    assert_eq!(first, second);
}
