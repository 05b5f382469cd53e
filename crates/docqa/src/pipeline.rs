//! End-to-end pipeline: ingest a document, then answer questions about it

use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;

use crate::config::RagConfig;
use crate::embeddings::EmbeddingGateway;
use crate::error::{Error, Result};
use crate::generation::AnswerSynthesizer;
use crate::index::{short_id, IndexStore, VectorIndex};
use crate::ingestion::{AutoExtractor, ExtractedText, Segmenter, TextExtractor};
use crate::providers::{build_providers, EmbeddingProvider, LlmProvider};
use crate::retrieval::Retriever;
use crate::retry::with_timeout;
use crate::types::{DocumentSession, IndexInfo, QueryResponse, RetrievedChunk};

/// Health of the external models
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProviderHealth {
    pub embedding: bool,
    pub generation: bool,
}

/// Stateless document question-answering pipeline
///
/// Holds configuration and model handles only; every document lives in the
/// [`DocumentSession`] returned from ingestion.
pub struct RagPipeline {
    config: RagConfig,
    extractor: Arc<dyn TextExtractor>,
    segmenter: Segmenter,
    gateway: Arc<EmbeddingGateway>,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    store: Option<IndexStore>,
}

impl RagPipeline {
    /// Build a pipeline with the providers named in `config`
    pub fn new(config: RagConfig) -> Result<Self> {
        config.validate()?;
        let providers = build_providers(&config)?;
        Self::with_providers(config, providers.embedder, providers.llm)
    }

    /// Build a pipeline around explicit providers
    pub fn with_providers(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let segmenter = Segmenter::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        let gateway = Arc::new(EmbeddingGateway::from_config(embedder, &config));
        let retriever =
            Retriever::new(gateway.clone()).with_min_similarity(config.retrieval.min_similarity);
        let synthesizer = AnswerSynthesizer::from_config(llm, &config);
        let store = if config.storage.persist {
            Some(IndexStore::new(&config.storage.index_dir)?)
        } else {
            None
        };

        tracing::info!(
            "Pipeline ready: chunk_size={}, overlap={}, top_k={}, persist={}",
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
            config.retrieval.top_k,
            store.is_some()
        );

        Ok(Self {
            config,
            extractor: Arc::new(AutoExtractor),
            segmenter,
            gateway,
            retriever,
            synthesizer,
            store,
        })
    }

    /// Replace the text extractor used by [`ingest_bytes`](Self::ingest_bytes)
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<EmbeddingGateway> {
        &self.gateway
    }

    pub fn store(&self) -> Option<&IndexStore> {
        self.store.as_ref()
    }

    /// Lowercase hex SHA-256 of `bytes`
    pub fn document_id_for(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Extract text from an uploaded document and index it
    ///
    /// Extraction is bounded by `ingestion.extraction_timeout_secs`. A timed
    /// out extraction thread keeps running detached on the blocking pool and
    /// its result is dropped.
    pub async fn ingest_bytes(&self, bytes: impl Into<Bytes>) -> Result<DocumentSession> {
        let bytes: Bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::InvalidInput("uploaded document is empty".to_string()));
        }
        let document_id = Self::document_id_for(&bytes);

        let extractor = self.extractor.clone();
        let started = Instant::now();
        let task = tokio::task::spawn_blocking(move || extractor.extract(&bytes));
        let extracted = with_timeout(
            self.config.ingestion.extraction_timeout(),
            async move {
                task.await
                    .map_err(|e| Error::Extraction(format!("extraction task failed: {}", e)))?
            },
            || Error::Extraction("timed out extracting document text".to_string()),
        )
        .await?;

        tracing::info!(
            "Extracted {} chars ({} pages) from document {} in {:?}",
            extracted.text.chars().count(),
            extracted.page_count(),
            short_id(&document_id),
            started.elapsed()
        );

        self.ingest_extracted(&document_id, &extracted).await
    }

    /// Index plain text, identified by the hash of its UTF-8 bytes
    pub async fn ingest_text(&self, text: &str) -> Result<DocumentSession> {
        let document_id = Self::document_id_for(text.as_bytes());
        self.ingest_text_with_id(&document_id, text).await
    }

    /// Index `text` under `document_id`
    pub async fn ingest_text_with_id(
        &self,
        document_id: &str,
        text: &str,
    ) -> Result<DocumentSession> {
        self.ingest_extracted(document_id, &ExtractedText::plain(text)).await
    }

    /// Index extracted text under `document_id`, keeping page numbers
    ///
    /// Reuses a persisted index built with the current embedding model and
    /// segmentation when one exists. Otherwise segments, embeds and builds;
    /// any failure returns the error and leaves no session and no artifact
    /// behind.
    pub async fn ingest_extracted(
        &self,
        document_id: &str,
        document: &ExtractedText,
    ) -> Result<DocumentSession> {
        if let Some(index) = self.load_persisted(document_id)? {
            return Ok(DocumentSession::ready(document_id, index));
        }

        let started = Instant::now();
        let chunks = self.segmenter.segment_document(document);
        let chunk_count = chunks.len();
        let chunks = self.gateway.embed_chunks(chunks).await?;

        let mut index = VectorIndex::new(self.gateway.model_id(), self.gateway.dimensions())
            .with_segmenter(self.segmenter);
        index.build(chunks)?;

        if let Some(store) = &self.store {
            store.save(document_id, &index)?;
        }

        tracing::info!(
            "Indexed document {}: {} chunks in {:?}",
            short_id(document_id),
            chunk_count,
            started.elapsed()
        );

        Ok(DocumentSession::ready(document_id, index))
    }

    /// Load a persisted index when it matches the configured model and segmentation
    fn load_persisted(&self, document_id: &str) -> Result<Option<VectorIndex>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };

        match store.load(document_id, self.gateway.model_id(), self.gateway.dimensions()) {
            Ok(Some(index)) if index.segmenter() != Some(self.segmenter) => {
                let (size, overlap) = index
                    .segmenter()
                    .map_or((0, 0), |s| (s.chunk_size(), s.overlap()));
                tracing::warn!(
                    "Ignoring persisted index for {}: built with chunk_size={}, overlap={}, \
                     configured chunk_size={}, overlap={}; rebuilding",
                    short_id(document_id),
                    size,
                    overlap,
                    self.segmenter.chunk_size(),
                    self.segmenter.overlap()
                );
                Ok(None)
            }
            Ok(index) => Ok(index),
            Err(e @ Error::Io(_)) => Err(e),
            Err(e) => {
                tracing::warn!(
                    "Ignoring persisted index for {}: {}; rebuilding",
                    short_id(document_id),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Top-k chunks for `question` using the configured `top_k`
    pub async fn retrieve(
        &self,
        session: &DocumentSession,
        question: &str,
    ) -> Result<Vec<RetrievedChunk>> {
        self.retriever
            .retrieve(session, question, self.config.retrieval.top_k)
            .await
    }

    /// Answer `question` from `session`'s document
    pub async fn ask(&self, session: &DocumentSession, question: &str) -> Result<QueryResponse> {
        let started = Instant::now();
        let retrieved = self.retrieve(session, question).await?;
        let answer = self
            .synthesizer
            .answer(question, &retrieved, self.config.llm.max_context_length)
            .await?;

        let response = QueryResponse::new(
            session.document_id(),
            answer,
            &retrieved,
            started.elapsed().as_millis() as u64,
        );

        tracing::info!(
            "Answered question for {} using {}/{} chunks in {}ms",
            short_id(session.document_id()),
            response.chunks_used,
            response.chunks_retrieved,
            response.processing_time_ms
        );

        Ok(response)
    }

    /// Remove the persisted index for `document_id`; returns whether one existed
    pub fn clear_index(&self, document_id: &str) -> Result<bool> {
        match &self.store {
            Some(store) => store.remove(document_id),
            None => Ok(false),
        }
    }

    pub fn index_info(&self, session: &DocumentSession) -> IndexInfo {
        session.info()
    }

    pub async fn health(&self) -> ProviderHealth {
        let embedding = self.gateway.provider().health_check().await.unwrap_or(false);
        let generation = self
            .synthesizer
            .provider()
            .health_check()
            .await
            .unwrap_or(false);
        ProviderHealth {
            embedding,
            generation,
        }
    }
}
