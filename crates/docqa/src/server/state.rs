//! Application state for the HTTP server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::pipeline::RagPipeline;
use crate::session::SessionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    sessions: SessionRegistry,
}

impl AppState {
    /// Build the pipeline from `config` and wrap it in a fresh registry
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing application state (provider: {:?})", config.provider);
        let pipeline = Arc::new(RagPipeline::new(config.clone())?);
        Ok(Self::from_pipeline(pipeline))
    }

    pub fn from_pipeline(pipeline: Arc<RagPipeline>) -> Self {
        let config = pipeline.config().clone();
        Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions: SessionRegistry::new(pipeline),
            }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    pub fn pipeline(&self) -> &Arc<RagPipeline> {
        self.inner.sessions.pipeline()
    }
}
