//! End-to-end pipeline behaviour with deterministic providers

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docqa::config::EmbeddingBackend;
use docqa::generation::{Prompt, INSUFFICIENT_CONTEXT_ANSWER};
use docqa::index::IndexStore;
use docqa::ingestion::{segment, ExtractedText, TextExtractor};
use docqa::providers::{EmbeddingProvider, HashingEmbedder, LlmProvider};
use docqa::types::IndexStatus;
use docqa::{Error, RagConfig, RagPipeline, SessionRegistry};

const DIMS: usize = 64;

/// Hashing embeddings with call counting and injectable failures
struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
    texts_embedded: AtomicUsize,
    fail_on: Mutex<Option<String>>,
    failures_left: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: HashingEmbedder::new(DIMS).unwrap(),
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
            fail_on: Mutex::new(None),
            failures_left: AtomicUsize::new(0),
        })
    }

    fn fail_batches_containing(&self, text: &str, times: usize) {
        *self.fail_on.lock() = Some(text.to_string());
        self.failures_left.store(times, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed(&self, text: &str) -> docqa::Result<Vec<f32>> {
        Ok(self.inner.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> docqa::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let poisoned = self
            .fail_on
            .lock()
            .as_ref()
            .map_or(false, |p| texts.iter().any(|t| t == p));
        if poisoned && self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::embedding("connection reset by peer"));
        }
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.inner.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn health_check(&self) -> docqa::Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Returns a fixed answer and records every prompt
struct RecordingLlm {
    prompts: Mutex<Vec<Prompt>>,
}

impl RecordingLlm {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl LlmProvider for RecordingLlm {
    async fn generate(&self, prompt: &Prompt) -> docqa::Result<String> {
        self.prompts.lock().push(prompt.clone());
        Ok("The warranty lasts two years.".to_string())
    }

    async fn health_check(&self) -> docqa::Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "recording"
    }

    fn model(&self) -> &str {
        "recording"
    }
}

/// Two pages of text regardless of the uploaded bytes
struct TwoPageExtractor;

impl TextExtractor for TwoPageExtractor {
    fn extract(&self, _data: &[u8]) -> docqa::Result<ExtractedText> {
        Ok(ExtractedText::from_pages([
            "The warranty covers parts and labour for two years.",
            "Refunds are issued within thirty days when unused.",
        ]))
    }

    fn name(&self) -> &str {
        "two-page"
    }
}

/// Blocks the extraction thread before returning the bytes as text
struct SlowExtractor(Duration);

impl TextExtractor for SlowExtractor {
    fn extract(&self, data: &[u8]) -> docqa::Result<ExtractedText> {
        std::thread::sleep(self.0);
        Ok(ExtractedText::plain(String::from_utf8_lossy(data).into_owned()))
    }

    fn name(&self) -> &str {
        "slow"
    }
}

fn test_config(index_dir: &std::path::Path) -> RagConfig {
    let mut config = RagConfig::default();
    config.embeddings.backend = EmbeddingBackend::Hashing;
    config.embeddings.dimensions = DIMS;
    config.embeddings.batch_size = 2;
    config.embeddings.concurrency = 1;
    config.chunking.chunk_size = 50;
    config.chunking.chunk_overlap = 10;
    config.llm.max_retries = 0;
    config.llm.initial_backoff_ms = 1;
    config.storage.index_dir = index_dir.to_path_buf();
    config.storage.persist = true;
    config
}

fn pipeline(
    config: RagConfig,
    embedder: &Arc<CountingEmbedder>,
    llm: &Arc<RecordingLlm>,
) -> RagPipeline {
    RagPipeline::with_providers(config, embedder.clone(), llm.clone()).unwrap()
}

/// 400 ASCII chars: ten chunks at size 50 / overlap 10
fn ten_chunk_text() -> String {
    let mut text = String::new();
    let mut i = 0;
    while text.len() < 400 {
        text.push_str(&format!("term{} ", i));
        i += 1;
    }
    text.truncate(400);
    text
}

const MANUAL: &str = "The warranty covers parts and labour for two years from the date of purchase. \
Refunds are issued within thirty days when the product is returned unused. \
Shipping is free for orders above fifty dollars inside the country. \
Support is available by email on weekdays between nine and five.";

#[tokio::test]
async fn test_embedding_failure_mid_build_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let text = ten_chunk_text();
    let chunks = segment(&text, 50, 10).unwrap();
    assert_eq!(chunks.len(), 10);

    let embedder = CountingEmbedder::new();
    embedder.fail_batches_containing(&chunks[7].text, usize::MAX);
    let pipeline = pipeline(config, &embedder, &RecordingLlm::new());
    let registry = SessionRegistry::new(Arc::new(pipeline));

    let err = registry.upload_text(&text).await.unwrap_err();

    assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    assert!(registry.is_empty());
    let store = IndexStore::new(dir.path()).unwrap();
    let id = RagPipeline::document_id_for(text.as_bytes());
    assert!(!store.exists(&id).unwrap());
    assert!(store.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_retried_build_only_embeds_missing_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let text = ten_chunk_text();
    let chunks = segment(&text, 50, 10).unwrap();

    let embedder = CountingEmbedder::new();
    embedder.fail_batches_containing(&chunks[7].text, 1);
    let pipeline = pipeline(test_config(dir.path()), &embedder, &RecordingLlm::new());

    assert!(pipeline.ingest_text(&text).await.is_err());
    // Batches [0,1] [2,3] [4,5] completed before [6,7] failed
    assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 6);

    let session = pipeline.ingest_text(&text).await.unwrap();

    assert!(session.index_ready());
    assert_eq!(session.chunk_count(), 10);
    assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 10);
    assert_eq!(pipeline.gateway().cache_len(), 10);
}

#[tokio::test]
async fn test_persisted_index_is_reused_with_identical_rankings() {
    let dir = tempfile::tempdir().unwrap();
    let llm = RecordingLlm::new();

    let first_embedder = CountingEmbedder::new();
    let first = pipeline(test_config(dir.path()), &first_embedder, &llm);
    let built = first.ingest_text(MANUAL).await.unwrap();
    let before: Vec<(u32, f32)> = first
        .retrieve(&built, "how long is the warranty")
        .await
        .unwrap()
        .iter()
        .map(|r| (r.chunk.id, r.score))
        .collect();

    let second_embedder = CountingEmbedder::new();
    let second = pipeline(test_config(dir.path()), &second_embedder, &llm);
    let loaded = second.ingest_text(MANUAL).await.unwrap();
    assert_eq!(second_embedder.texts_embedded.load(Ordering::SeqCst), 0);
    assert_eq!(loaded.document_id(), built.document_id());
    assert_eq!(loaded.chunk_count(), built.chunk_count());

    let after: Vec<(u32, f32)> = second
        .retrieve(&loaded, "how long is the warranty")
        .await
        .unwrap()
        .iter()
        .map(|r| (r.chunk.id, r.score))
        .collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_changed_chunking_rebuilds_persisted_index() {
    let dir = tempfile::tempdir().unwrap();
    let llm = RecordingLlm::new();

    let first = pipeline(test_config(dir.path()), &CountingEmbedder::new(), &llm);
    let built = first.ingest_text(MANUAL).await.unwrap();
    assert_eq!(built.chunk_count(), segment(MANUAL, 50, 10).unwrap().len());

    let mut wider = test_config(dir.path());
    wider.chunking.chunk_size = 120;
    wider.chunking.chunk_overlap = 0;
    let expected = segment(MANUAL, 120, 0).unwrap();
    assert_ne!(expected.len(), built.chunk_count());

    let embedder = CountingEmbedder::new();
    let second = pipeline(wider.clone(), &embedder, &llm);
    let rebuilt = second.ingest_text(MANUAL).await.unwrap();

    assert_eq!(rebuilt.document_id(), built.document_id());
    let texts: Vec<&str> = rebuilt.chunks().iter().map(|c| c.text.as_str()).collect();
    let expected_texts: Vec<&str> = expected.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, expected_texts);
    assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), expected.len());

    // The overwritten artifact is reused under the new settings
    let reuse_embedder = CountingEmbedder::new();
    let third = pipeline(wider, &reuse_embedder, &llm);
    let reloaded = third.ingest_text(MANUAL).await.unwrap();
    assert_eq!(reloaded.chunk_count(), expected.len());
    assert_eq!(reuse_embedder.texts_embedded.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pdf_pages_flow_into_citations_and_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let llm = RecordingLlm::new();
    let first = pipeline(test_config(dir.path()), &CountingEmbedder::new(), &llm)
        .with_extractor(Arc::new(TwoPageExtractor));

    let session = first.ingest_bytes(b"%PDF-1.4 two pages".to_vec()).await.unwrap();

    let pages: Vec<Option<u32>> = session.chunks().iter().map(|c| c.page).collect();
    assert_eq!(pages.first(), Some(&Some(1)));
    assert_eq!(pages.last(), Some(&Some(2)));
    assert!(pages.windows(2).all(|w| w[0] <= w[1]));

    let response = first
        .ask(&session, "When are refunds issued?")
        .await
        .unwrap();
    assert!(!response.citations.is_empty());
    for citation in &response.citations {
        assert_eq!(citation.page, session.chunk(citation.chunk_id).unwrap().page);
        assert!(citation.page.is_some());
    }

    let second = pipeline(test_config(dir.path()), &CountingEmbedder::new(), &llm)
        .with_extractor(Arc::new(TwoPageExtractor));
    let reloaded = second.ingest_bytes(b"%PDF-1.4 two pages".to_vec()).await.unwrap();
    let reloaded_pages: Vec<Option<u32>> = reloaded.chunks().iter().map(|c| c.page).collect();
    assert_eq!(reloaded_pages, pages);
}

#[tokio::test]
async fn test_extraction_has_its_own_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.ingestion.extraction_timeout_secs = 1;
    config.llm.timeout_secs = 60;
    let embedder = CountingEmbedder::new();
    let pipeline = pipeline(config, &embedder, &RecordingLlm::new())
        .with_extractor(Arc::new(SlowExtractor(Duration::from_millis(1500))));

    let err = pipeline
        .ingest_bytes(MANUAL.as_bytes().to_vec())
        .await
        .unwrap_err();

    match err {
        Error::Extraction(message) => assert!(message.contains("timed out")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_artifact_from_other_model_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = CountingEmbedder::new();
    let pipeline = pipeline(test_config(dir.path()), &embedder, &RecordingLlm::new());
    let session = pipeline.ingest_text(MANUAL).await.unwrap();

    let store = IndexStore::new(dir.path()).unwrap();
    let err = store
        .load(session.document_id(), "text-embedding-ada-002", DIMS)
        .unwrap_err();
    assert_eq!(err.kind(), docqa::ErrorKind::DimensionMismatch);
    assert!(matches!(err, Error::ModelMismatch { .. }));
}

#[tokio::test]
async fn test_ask_cites_only_packed_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.llm.max_context_length = 12;
    let llm = RecordingLlm::new();
    let pipeline = pipeline(config, &CountingEmbedder::new(), &llm);

    let session = pipeline.ingest_text(MANUAL).await.unwrap();
    let response = pipeline
        .ask(&session, "How long does the warranty cover parts?")
        .await
        .unwrap();

    assert_eq!(response.answer.text, "The warranty lasts two years.");
    assert_eq!(response.chunks_retrieved, 4);
    assert!(response.chunks_used >= 1);
    assert!(response.chunks_used < response.chunks_retrieved);
    let cited: Vec<u32> = response.citations.iter().map(|c| c.chunk_id).collect();
    assert_eq!(cited, response.answer.cited_chunk_ids);

    let prompts = llm.prompts.lock();
    assert_eq!(prompts.len(), 1);
    for citation in &response.citations {
        assert!(prompts[0].system.contains(citation.snippet.trim()));
    }
    for (rank, citation) in response.citations.iter().enumerate() {
        assert_eq!(citation.rank, rank + 1);
    }
}

#[tokio::test]
async fn test_empty_document_answers_without_model_call() {
    let dir = tempfile::tempdir().unwrap();
    let llm = RecordingLlm::new();
    let embedder = CountingEmbedder::new();
    let pipeline = pipeline(test_config(dir.path()), &embedder, &llm);

    let session = pipeline.ingest_text("").await.unwrap();
    assert!(session.index_ready());
    assert_eq!(session.chunk_count(), 0);

    let response = pipeline.ask(&session, "Anything?").await.unwrap();

    assert_eq!(response.answer.text, INSUFFICIENT_CONTEXT_ANSWER);
    assert!(response.citations.is_empty());
    assert_eq!(llm.call_count(), 0);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_registry_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let registry = SessionRegistry::new(Arc::new(pipeline(
        test_config(dir.path()),
        &CountingEmbedder::new(),
        &RecordingLlm::new(),
    )));

    let info = registry.upload(MANUAL.as_bytes().to_vec()).await.unwrap();
    assert_eq!(info.status, IndexStatus::Ready);
    assert_eq!(info.embedding_dimension, DIMS);
    assert_eq!(info.document_id, RagPipeline::document_id_for(MANUAL.as_bytes()));
    assert_eq!(registry.list().len(), 1);

    // Same bytes map to the same session
    registry.upload(MANUAL.as_bytes().to_vec()).await.unwrap();
    assert_eq!(registry.len(), 1);

    let response = registry.ask(&info.document_id, "What about refunds?").await.unwrap();
    assert!(response.answer.is_grounded());

    registry.clear_index(&info.document_id).unwrap();
    assert!(registry.is_empty());
    assert!(IndexStore::new(dir.path()).unwrap().list().unwrap().is_empty());

    let err = registry.ask(&info.document_id, "again?").await.unwrap_err();
    assert_eq!(err.kind(), docqa::ErrorKind::NotFound);
    assert!(matches!(
        registry.clear_index(&info.document_id),
        Err(Error::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_invalid_config_fails_at_construction() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.chunking.chunk_overlap = config.chunking.chunk_size;

    let result = RagPipeline::with_providers(config, CountingEmbedder::new(), RecordingLlm::new());
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
