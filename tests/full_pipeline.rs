use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use hrag::{
    AnnRequest, CollectionSchema, Embedder, EmbeddingData, EmbeddingError, EmbeddingResult, Hit,
    HragConfig, HragError, HybridRag, IndexConfig, IndexError, NewRecord, RetrievalError,
    SearchMode, SearchRequest, VectorIndex, VectorStore, chunk,
};

const DIM: usize = 4;

/// Feline words light up axis 0, canine words axis 1. Sparse ids are word
/// lengths, enough to make lexical overlap observable.
struct AnimalEmbedder;

#[async_trait]
impl Embedder for AnimalEmbedder {
    fn name(&self) -> &str {
        "animal"
    }

    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let t = text.to_lowercase();
                let dense = vec![
                    if t.contains("feline") || t.contains("cat") { 0.9 } else { 0.1 },
                    if t.contains("canine") || t.contains("dog") { 0.9 } else { 0.1 },
                    0.1,
                    0.1,
                ];
                let sparse = t
                    .split_whitespace()
                    .map(|w| (w.len() as u32, 0.5))
                    .collect();
                EmbeddingData::new(dense, sparse)
            })
            .collect())
    }
}

struct CountingIndex {
    inner: VectorIndex,
    calls: AtomicUsize,
}

impl CountingIndex {
    fn new(schema: CollectionSchema) -> Arc<Self> {
        Arc::new(Self {
            inner: VectorIndex::new(IndexConfig::new().with_schema(schema)).unwrap(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl VectorStore for CountingIndex {
    fn schema(&self) -> &CollectionSchema {
        self.inner.schema()
    }

    async fn insert(&self, records: Vec<NewRecord>) -> Result<Vec<String>, IndexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(records)
    }

    async fn search(&self, request: AnnRequest) -> Result<Vec<Hit>, IndexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.search(&request)
    }
}

fn service() -> (HybridRag, Arc<CountingIndex>, Arc<CountingIndex>) {
    let global = CountingIndex::new(CollectionSchema::global(DIM));
    let tenant = CountingIndex::new(CollectionSchema::tenant_scoped(DIM));
    let rag = HybridRag::from_parts(
        HragConfig::stub(DIM),
        Arc::new(AnimalEmbedder),
        global.clone(),
        tenant.clone(),
        None,
    )
    .expect("service assembles");
    (rag, global, tenant)
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn feline_query_finds_cats() {
    let (rag, _, _) = service();
    rag.ingest(None, texts(&["cats are felines", "dogs are canines"]), true)
        .await
        .unwrap();

    let results = rag
        .hybrid_search("feline animal", None, 1.0, 0.7, 1)
        .await
        .unwrap();
    assert_eq!(results, vec!["cats are felines".to_string()]);
}

#[tokio::test]
async fn tenant_document_is_chunked_into_records() {
    let (rag, global, tenant) = service();
    let doc: String = "The quick brown fox jumps over the lazy dog. "
        .chars()
        .cycle()
        .take(5000)
        .collect();
    let expected = chunk(&[doc.clone()], 2000);

    let outcome = rag.ingest(Some("U1"), vec![doc], true).await.unwrap();
    assert_eq!(outcome.inserted, expected.len());
    assert_eq!(tenant.inner.len().unwrap(), expected.len());
    assert_eq!(global.inner.len().unwrap(), 0);

    let all = tenant
        .inner
        .search(&AnnRequest::dense(vec![0.0, 0.0, 1.0, 0.0], 100))
        .unwrap();
    for hit in all {
        let record = tenant.inner.get(&hit.id).unwrap().unwrap();
        assert_eq!(record.tenant_id.as_deref(), Some("U1"));
    }
}

#[tokio::test]
async fn zero_limit_never_reaches_storage() {
    let (rag, global, tenant) = service();
    assert!(rag.search("anything", None, Some(0)).await.unwrap().is_empty());
    assert!(rag.search("anything", Some("U1"), Some(0)).await.unwrap().is_empty());
    assert_eq!(global.calls.load(Ordering::SeqCst), 0);
    assert_eq!(tenant.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tenant_a_is_invisible_to_tenant_b() {
    let (rag, _, _) = service();
    rag.ingest(Some("A"), texts(&["cats are felines", "dogs are canines"]), true)
        .await
        .unwrap();

    for mode in [SearchMode::Hybrid, SearchMode::Dense, SearchMode::Sparse] {
        for query in ["cats are felines", "dogs", "are"] {
            let request = SearchRequest::new(query)
                .with_tenant(Some("B".into()))
                .with_mode(mode);
            assert!(rag.search_with(&request).await.unwrap().is_empty());
        }
    }
    assert_eq!(rag.dense_search("cats", Some("A"), 5).await.unwrap().len(), 2);
    assert!(rag.dense_search("cats", None, 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn save_flag_controls_storage() {
    let (rag, global, _) = service();
    let outcome = rag
        .ingest(None, texts(&["cats are felines"]), false)
        .await
        .unwrap();
    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.embeddings.len(), 1);
    assert_eq!(global.inner.len().unwrap(), 0);
}

#[tokio::test]
async fn invalid_weights_are_client_errors() {
    let (rag, _, _) = service();
    let err = rag
        .hybrid_search("cats", None, f32::NAN, 0.7, 3)
        .await
        .unwrap_err();
    match err {
        HragError::Retrieval(inner) => {
            assert!(matches!(inner, RetrievalError::InvalidRequest(_)));
            assert!(inner.is_client_error());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn sparse_search_uses_lexical_overlap_only() {
    let (rag, _, _) = service();
    rag.ingest(None, texts(&["aaaaaaa", "bb"]), true).await.unwrap();
    let results = rag.sparse_search("zz", None, 5).await.unwrap();
    assert_eq!(results, vec!["bb".to_string()]);
}
