//! Configuration for the question-answering pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Environment variable naming a TOML config file
pub const CONFIG_PATH_ENV: &str = "DOCQA_CONFIG";

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Which backend serves embeddings and generation
    #[serde(default)]
    pub provider: ProviderKind,
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Text extraction configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Generation model configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Index persistence configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backend provider selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible HTTP API
    #[default]
    OpenAi,
    /// Local Ollama server
    Ollama,
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(Error::config(format!("unknown provider '{}'", other))),
        }
    }
}

/// Where embeddings come from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// The configured [`ProviderKind`]
    #[default]
    Provider,
    /// Offline feature hashing; no network, lexical similarity only
    Hashing,
}

impl FromStr for EmbeddingBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "provider" => Ok(Self::Provider),
            "hashing" => Ok(Self::Hashing),
            other => Err(Error::config(format!("unknown embedding backend '{}'", other))),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Text extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Upper bound on extracting text from one upload, in seconds
    ///
    /// Extraction runs on the blocking pool and cannot be interrupted; on
    /// expiry the upload fails and the extraction thread is left detached
    /// until it finishes, its result discarded.
    pub extraction_timeout_secs: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            extraction_timeout_secs: 120,
        }
    }
}

impl IngestionConfig {
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    pub top_k: usize,
    /// Results scoring below this cosine similarity are dropped
    pub min_similarity: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            min_similarity: None,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding source
    pub backend: EmbeddingBackend,
    /// Embedding model id
    pub model: String,
    /// Embedding dimensions (1536 for ada-002, 768 for nomic-embed-text)
    pub dimensions: usize,
    /// Texts per model call
    pub batch_size: usize,
    /// Batches in flight at once
    pub concurrency: usize,
    /// Maximum cached vectors (0 disables the cache)
    pub cache_capacity: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Provider,
            model: "text-embedding-ada-002".to_string(),
            dimensions: 1536,
            batch_size: 16,
            concurrency: 4,
            cache_capacity: 10_000,
        }
    }
}

/// Generation model and transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL
    pub openai_base_url: String,
    /// Ollama base URL
    pub ollama_base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Generation model id
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Token budget for packed context
    pub max_context_length: usize,
    /// Request timeout in seconds, applied to every external call
    pub timeout_secs: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry
    pub initial_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com/v1".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            generate_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_context_length: 3000,
            timeout_secs: 60,
            max_retries: 3,
            initial_backoff_ms: 500,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff policy shared by embedding and generation calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
        )
    }
}

/// Index persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one index artifact per document
    pub index_dir: PathBuf,
    /// Persist built indexes and reuse them for the same document
    pub persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let index_dir = dirs::data_local_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
            .join("docqa")
            .join("indexes");

        Self {
            index_dir,
            persist: true,
        }
    }
}

impl RagConfig {
    /// Parse a TOML config file; missing sections fall back to defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::config(format!("invalid config: {}", e)))
    }

    /// Defaults, then `$DOCQA_CONFIG` if set, then `DOCQA_*` variables
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                tracing::info!("Loading configuration from {}", path);
                Self::from_file(path)?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOCQA_*` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "DOCQA_PROVIDER")? {
            self.provider = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCQA_EXTRACTION_TIMEOUT_SECS")? {
            self.ingestion.extraction_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCQA_CHUNK_SIZE")? {
            self.chunking.chunk_size = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCQA_CHUNK_OVERLAP")? {
            self.chunking.chunk_overlap = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCQA_TOP_K")? {
            self.retrieval.top_k = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCQA_MIN_SIMILARITY")? {
            self.retrieval.min_similarity = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "DOCQA_EMBEDDING_BACKEND")? {
            self.embeddings.backend = v;
        }
        if let Some(v) = lookup("DOCQA_EMBEDDING_MODEL") {
            self.embeddings.model = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCQA_EMBEDDING_DIMENSIONS")? {
            self.embeddings.dimensions = v;
        }
        if let Some(v) = lookup("DOCQA_GENERATION_MODEL") {
            self.llm.generate_model = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCQA_MAX_CONTEXT_LENGTH")? {
            self.llm.max_context_length = v;
        }
        if let Some(v) = lookup("DOCQA_INDEX_DIR") {
            self.storage.index_dir = PathBuf::from(v);
        }
        if let Some(v) = parse_var(&lookup, "DOCQA_PORT")? {
            self.server.port = v;
        }
        Ok(())
    }

    /// Reject invalid combinations before any session is built
    pub fn validate(&self) -> Result<()> {
        if self.ingestion.extraction_timeout_secs == 0 {
            return Err(Error::config("extraction_timeout_secs must be greater than 0"));
        }
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::config("top_k must be greater than 0"));
        }
        if let Some(floor) = self.retrieval.min_similarity {
            if !(-1.0..=1.0).contains(&floor) {
                return Err(Error::config(format!(
                    "min_similarity {} is outside [-1, 1]",
                    floor
                )));
            }
        }
        if self.embeddings.model.trim().is_empty() {
            return Err(Error::config("embedding model id is required"));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::config("embedding dimensions must be greater than 0"));
        }
        if self.embeddings.batch_size == 0 || self.embeddings.concurrency == 0 {
            return Err(Error::config(
                "embedding batch_size and concurrency must be greater than 0",
            ));
        }
        if self.llm.generate_model.trim().is_empty() {
            return Err(Error::config("generation model id is required"));
        }
        if self.llm.max_context_length == 0 {
            return Err(Error::config("max_context_length must be greater than 0"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be greater than 0"));
        }
        if self.llm.temperature < 0.0 {
            return Err(Error::config("temperature must not be negative"));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}
