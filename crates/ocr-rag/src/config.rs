//! Configuration for ingestion, indexing and search

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// SQLite state and text store
    pub storage: StorageConfig,
    /// Admission and worker pool
    pub processing: ProcessingConfig,
    /// Rasterization and text recognition
    pub ocr: OcrConfig,
    /// Dense and sparse encoders
    pub embeddings: EmbeddingConfig,
    /// Vector index backend
    pub vector_db: VectorDbConfig,
    /// Search defaults
    pub search: SearchConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Load from `OCR_RAG_CONFIG` if set, otherwise defaults, then apply env overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("OCR_RAG_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override connection settings from the environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("OCR_RAG_DB_PATH") {
            self.storage.db_path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("QDRANT_URL") {
            self.vector_db.url = url;
            self.vector_db.backend = VectorBackend::Qdrant;
        }
        if let Ok(key) = std::env::var("QDRANT_API_KEY") {
            self.vector_db.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.embeddings.base_url = url;
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.processing.admission_limit == 0 {
            return Err(Error::Config("processing.admission_limit must be > 0".into()));
        }
        if self.processing.workers == 0 {
            return Err(Error::Config("processing.workers must be > 0".into()));
        }
        if self.processing.queue_capacity == 0 {
            return Err(Error::Config("processing.queue_capacity must be > 0".into()));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be > 0".into()));
        }
        if self.embeddings.sparse_buckets == 0 {
            return Err(Error::Config("embeddings.sparse_buckets must be > 0".into()));
        }
        if self.ocr.dpi == 0 {
            return Err(Error::Config("ocr.dpi must be > 0".into()));
        }
        if self.vector_db.snippet_chars == 0 {
            return Err(Error::Config("vector_db.snippet_chars must be > 0".into()));
        }
        Ok(())
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
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// SQLite storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file holding file metadata, blobs and page text
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ocr-rag")
            .join("files.db");

        Self { db_path }
    }
}

/// Admission and worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum number of files queued or parsing at once
    pub admission_limit: usize,
    /// Number of concurrent extraction workers
    pub workers: usize,
    /// Capacity of the job channel between submit and workers
    pub queue_capacity: usize,
    /// Upper bound on the extraction stage of a job, in seconds
    pub job_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            admission_limit: 5,
            workers: 4,
            queue_capacity: 64,
            job_timeout_secs: 600, // 10 minutes
        }
    }
}

impl ProcessingConfig {
    pub fn job_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.job_timeout_secs)
    }
}

/// Rasterization and recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Recognition languages (tesseract codes)
    pub languages: Vec<String>,
    /// Rasterization resolution for paginated documents
    pub dpi: u32,
    /// Start on the accelerated engine
    pub accelerated: bool,
    /// CPU recognition program
    pub cpu_command: String,
    /// Accelerated recognition program; falls back to `cpu_command` with
    /// `accelerator_args` when unset
    pub accelerated_command: Option<String>,
    /// Extra arguments passed only in accelerated mode
    pub accelerator_args: Vec<String>,
    /// PDF rasterizer program
    pub rasterizer_command: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: vec!["eng".to_string()],
            dpi: 200,
            accelerated: true,
            cpu_command: "tesseract".to_string(),
            accelerated_command: None,
            accelerator_args: vec!["--oem".to_string(), "1".to_string()],
            rasterizer_command: "pdftoppm".to_string(),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Dense embedding model name
    pub model: String,
    /// Dense vector dimensions (384 for MiniLM)
    pub dimensions: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// Hash space of the sparse term encoder
    pub sparse_buckets: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "all-minilm".to_string(),
            dimensions: 384,
            timeout_secs: 60,
            max_retries: 2,
            sparse_buckets: 1 << 20,
        }
    }
}

/// Vector index backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// In-process index, lost on restart
    #[default]
    Local,
    /// Qdrant over its REST API
    Qdrant,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    pub backend: VectorBackend,
    /// Qdrant base URL
    pub url: String,
    /// Qdrant API key
    pub api_key: Option<String>,
    /// Collection name
    pub collection: String,
    /// Maximum characters kept in the payload snippet
    pub snippet_chars: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Local,
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "documents".to_string(),
            snippet_chars: 500,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

/// Search defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Minimum cosine similarity for semantic hits
    pub semantic_threshold: f32,
    /// Minimum term-weight score for keyword hits
    pub keyword_threshold: f32,
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_threshold: 0.5,
            keyword_threshold: 0.1,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            default_limit: 10,
            max_limit: 100,
        }
    }
}
