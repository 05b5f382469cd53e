//! Registry of live document sessions

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::pipeline::RagPipeline;
use crate::types::{DocumentSession, IndexInfo, QueryResponse};

/// Sessions keyed by document id
///
/// Sessions are immutable once inserted; an upload of the same document
/// replaces the entry wholesale.
pub struct SessionRegistry {
    pipeline: Arc<RagPipeline>,
    sessions: DashMap<String, Arc<DocumentSession>>,
}

impl SessionRegistry {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self {
            pipeline,
            sessions: DashMap::new(),
        }
    }

    pub fn pipeline(&self) -> &Arc<RagPipeline> {
        &self.pipeline
    }

    /// Ingest an uploaded document and register its session
    pub async fn upload(&self, bytes: impl Into<Bytes>) -> Result<IndexInfo> {
        let session = self.pipeline.ingest_bytes(bytes).await?;
        Ok(self.insert(session))
    }

    /// Ingest plain text and register its session
    pub async fn upload_text(&self, text: &str) -> Result<IndexInfo> {
        let session = self.pipeline.ingest_text(text).await?;
        Ok(self.insert(session))
    }

    fn insert(&self, session: DocumentSession) -> IndexInfo {
        let info = session.info();
        self.sessions
            .insert(session.document_id().to_string(), Arc::new(session));
        info
    }

    pub fn get(&self, document_id: &str) -> Option<Arc<DocumentSession>> {
        self.sessions.get(document_id).map(|s| s.value().clone())
    }

    /// Ask a question about an uploaded document
    pub async fn ask(&self, document_id: &str, question: &str) -> Result<QueryResponse> {
        let session = self
            .get(document_id)
            .ok_or_else(|| Error::SessionNotFound(document_id.to_string()))?;
        self.pipeline.ask(&session, question).await
    }

    /// Drop the session and its persisted index
    pub fn clear_index(&self, document_id: &str) -> Result<()> {
        let had_session = self.sessions.remove(document_id).is_some();
        let had_artifact = self.pipeline.clear_index(document_id)?;
        if !had_session && !had_artifact {
            return Err(Error::SessionNotFound(document_id.to_string()));
        }
        tracing::info!("Cleared index for document {}", document_id);
        Ok(())
    }

    pub fn info(&self, document_id: &str) -> Result<IndexInfo> {
        self.get(document_id)
            .map(|s| s.info())
            .ok_or_else(|| Error::SessionNotFound(document_id.to_string()))
    }

    /// All sessions, oldest first
    pub fn list(&self) -> Vec<IndexInfo> {
        let mut infos: Vec<IndexInfo> = self.sessions.iter().map(|s| s.info()).collect();
        infos.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        infos
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
