//! Document service: the single entry point for uploads, state and search
//!
//! Wires the state and text stores, the admission controller, the dispatcher
//! with its ingestion pipeline, and the hybrid query engine.

use serde::Serialize;
use std::sync::Arc;

use crate::config::{RagConfig, VectorBackend};
use crate::error::{Error, Result};
use crate::ingestion::{
    DocumentExtractor, PopplerRasterizer, RecognitionService, TesseractEngineFactory, TextExtractor,
};
use crate::processing::{
    Admission, AdmissionController, Dispatcher, ExtractionJob, IngestionPipeline, RejectReason,
};
use crate::providers::{
    EmbeddingProvider, LocalVectorStore, OllamaEmbedder, QdrantVectorStore, StateStore, TextStore,
    VectorStoreProvider,
};
use crate::retrieval::{HybridSearchEngine, PageIndex};
use crate::storage::SqliteStore;
use crate::types::{FileId, FileRecord, HybridHit, PageText, ParsingState, SearchHit, UploadOutcome};

const MAX_FILENAME_LEN: usize = 255;

/// Provider health summary
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub embedder: bool,
    pub vector_store: bool,
    pub active_jobs: usize,
    pub in_flight: usize,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.embedder && self.vector_store
    }
}

/// Upload, state, search and deletion over one set of stores
pub struct DocumentService {
    config: RagConfig,
    state_store: Arc<dyn StateStore>,
    text_store: Arc<dyn TextStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    admission: AdmissionController,
    dispatcher: Dispatcher,
    pipeline: Arc<IngestionPipeline>,
    index: Arc<PageIndex>,
    search: HybridSearchEngine,
}

impl DocumentService {
    /// Build every component from configuration
    ///
    /// Must be called inside a tokio runtime; the dispatcher spawns its workers.
    pub async fn build(config: RagConfig) -> Result<Self> {
        config.validate()?;

        let sqlite = Arc::new(SqliteStore::new(&config.storage.db_path)?);
        tracing::info!("State store: {}", config.storage.db_path.display());

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbedder::new(&config.embeddings)?);
        tracing::info!("Embedder: {} ({})", embedder.name(), config.embeddings.model);

        let vectors: Arc<dyn VectorStoreProvider> = match config.vector_db.backend {
            VectorBackend::Local => Arc::new(LocalVectorStore::new(config.embeddings.dimensions)),
            VectorBackend::Qdrant => Arc::new(
                QdrantVectorStore::connect(&config.vector_db, config.embeddings.dimensions).await?,
            ),
        };
        tracing::info!("Vector store: {}", vectors.name());

        let factory = TesseractEngineFactory::new(config.ocr.clone());
        let initial_mode = factory.initial_mode();
        let recognizer = Arc::new(RecognitionService::new(Arc::new(factory), initial_mode));
        let rasterizer = PopplerRasterizer::new(config.ocr.rasterizer_command.clone());
        if !rasterizer.is_available() {
            tracing::warn!(
                program = %config.ocr.rasterizer_command,
                "PDF rasterizer not found; PDF uploads will fail"
            );
        }
        let extractor: Arc<dyn TextExtractor> = Arc::new(DocumentExtractor::new(
            Arc::new(rasterizer),
            recognizer,
            config.ocr.dpi,
        ));
        tracing::info!(mode = ?initial_mode, languages = ?config.ocr.languages, "Recognition service ready");

        Ok(Self::from_components(
            config,
            sqlite.clone(),
            sqlite,
            extractor,
            embedder,
            vectors,
        ))
    }

    /// Assemble the service from already constructed providers
    pub fn from_components(
        config: RagConfig,
        state_store: Arc<dyn StateStore>,
        text_store: Arc<dyn TextStore>,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        let index = Arc::new(PageIndex::new(
            embedder.clone(),
            vectors.clone(),
            config.vector_db.snippet_chars,
        ));
        let pipeline = Arc::new(IngestionPipeline::new(
            state_store.clone(),
            text_store.clone(),
            extractor,
            index.clone(),
            config.processing.job_timeout(),
        ));
        let dispatcher = Dispatcher::start(pipeline.clone(), &config.processing);
        let admission = AdmissionController::new(state_store.clone(), config.processing.admission_limit);
        let search = HybridSearchEngine::new(embedder.clone(), vectors, config.search.clone());

        Self {
            config,
            state_store,
            text_store,
            embedder,
            admission,
            dispatcher,
            pipeline,
            index,
            search,
        }
    }

    /// Store a file and try to schedule its extraction
    ///
    /// The file is persisted before admission, so a `QueueFull` error leaves
    /// it `pending`; `schedule_file` retries it later.
    pub async fn upload_and_schedule(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadOutcome> {
        validate_upload(filename, &bytes)?;

        let record = self.state_store.create_file(filename, &bytes).await?;
        tracing::info!(file_id = record.id, filename, bytes = record.file_size, "Stored upload");

        self.admit_and_submit(record, bytes).await
    }

    /// Retry scheduling for a file that is still `pending`
    pub async fn schedule_file(&self, file_id: FileId) -> Result<UploadOutcome> {
        let record = self.get_file(file_id).await?;
        if record.parsing_state != ParsingState::Pending {
            return Err(Error::validation(format!(
                "File {} is {}; only pending files can be scheduled",
                file_id, record.parsing_state
            )));
        }
        let bytes = self
            .state_store
            .get_blob(file_id)
            .await?
            .ok_or(Error::NotFound(file_id))?;

        self.admit_and_submit(record, bytes).await
    }

    async fn admit_and_submit(&self, record: FileRecord, bytes: Vec<u8>) -> Result<UploadOutcome> {
        let file_id = record.id;

        match self.admission.try_admit(file_id).await? {
            Admission::Accepted => {}
            Admission::Rejected(RejectReason::QueueFull { active, limit }) => {
                return Err(Error::QueueFull {
                    file_id,
                    active,
                    limit,
                });
            }
            Admission::Rejected(RejectReason::NotPending(state)) => {
                return Err(Error::validation(format!(
                    "File {} cannot be scheduled from state {:?}",
                    file_id, state
                )));
            }
        }

        let job = ExtractionJob::new(file_id, record.filename.clone(), bytes);
        let scheduled = match self.dispatcher.submit(job) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(file_id, error = %e, "Failed to schedule extraction, reverting to pending");
                match self.state_store.set_state(file_id, ParsingState::Pending).await {
                    Ok(true) => {}
                    Ok(false) => tracing::error!(file_id, "Revert to pending refused"),
                    Err(e) => tracing::error!(file_id, error = %e, "Failed to revert to pending"),
                }
                false
            }
        };

        if scheduled {
            tracing::info!(file_id, "Extraction scheduled");
        }

        Ok(UploadOutcome {
            file_id,
            filename: record.filename,
            file_size: record.file_size,
            scheduled,
        })
    }

    pub async fn get_parsing_state(&self, file_id: FileId) -> Result<ParsingState> {
        self.state_store
            .get_state(file_id)
            .await?
            .ok_or(Error::NotFound(file_id))
    }

    pub async fn get_file(&self, file_id: FileId) -> Result<FileRecord> {
        self.state_store
            .get_file(file_id)
            .await?
            .ok_or(Error::NotFound(file_id))
    }

    pub async fn get_blob(&self, file_id: FileId) -> Result<Vec<u8>> {
        self.state_store
            .get_blob(file_id)
            .await?
            .ok_or(Error::NotFound(file_id))
    }

    pub async fn list_files(&self) -> Result<Vec<FileRecord>> {
        self.state_store.get_all_metadata().await
    }

    /// Extracted page text, ordered by page number
    pub async fn get_pages(&self, file_id: FileId) -> Result<Vec<PageText>> {
        self.get_file(file_id).await?;
        self.text_store.get_pages(file_id).await
    }

    pub async fn vector_count(&self, file_id: FileId) -> Result<usize> {
        self.index.count_for_file(file_id).await
    }

    /// Rebuild a finished file's vectors from its stored page text
    pub async fn reindex_file(&self, file_id: FileId) -> Result<usize> {
        self.pipeline.reindex(file_id).await
    }

    /// Delete a file, its page text and its vectors
    ///
    /// Files that are queued or parsing cannot be deleted. A vector deletion
    /// failure is logged and does not change the result.
    pub async fn delete_file(&self, file_id: FileId) -> Result<bool> {
        if !self.state_store.delete_file(file_id).await? {
            return match self.state_store.get_state(file_id).await? {
                Some(state) if state.is_active() => Err(Error::validation(format!(
                    "File {} is {}; wait until parsing finishes",
                    file_id, state
                ))),
                _ => Ok(false),
            };
        }

        match self.index.delete_all_for_file(file_id).await {
            Ok(points) => tracing::info!(file_id, points, "Deleted file vectors"),
            Err(e) => tracing::warn!(file_id, error = %e, "Failed to delete file vectors"),
        }

        Ok(true)
    }

    pub async fn search_semantic(
        &self,
        query: &str,
        limit: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>> {
        let limit = limit.unwrap_or(self.config.search.default_limit);
        self.search.search_semantic(query, limit, threshold).await
    }

    pub async fn search_keyword(
        &self,
        query: &str,
        limit: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>> {
        let limit = limit.unwrap_or(self.config.search.default_limit);
        self.search.search_keyword(query, limit, threshold).await
    }

    pub async fn search_hybrid(
        &self,
        query: &str,
        limit: Option<usize>,
        semantic_weight: Option<f32>,
        keyword_weight: Option<f32>,
    ) -> Result<Vec<HybridHit>> {
        let limit = limit.unwrap_or(self.config.search.default_limit);
        self.search
            .search_hybrid(query, limit, semantic_weight, keyword_weight)
            .await
    }

    pub async fn health(&self) -> HealthReport {
        let embedder = self.embedder.health_check().await.unwrap_or(false);
        let vector_store = self.index.store().health_check().await.unwrap_or(false);
        let active_jobs = self.state_store.count_active().await.unwrap_or(0);

        HealthReport {
            embedder,
            vector_store,
            active_jobs,
            in_flight: self.dispatcher.in_flight(),
        }
    }

    /// Stop accepting jobs and wait for running ones
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }
}

fn validate_upload(filename: &str, bytes: &[u8]) -> Result<()> {
    if filename.trim().is_empty() {
        return Err(Error::validation("Filename must not be empty"));
    }
    if filename.chars().count() > MAX_FILENAME_LEN {
        return Err(Error::validation(format!(
            "Filename too long (> {} characters)",
            MAX_FILENAME_LEN
        )));
    }
    if filename.contains(['/', '\\']) || filename.contains('\0') {
        return Err(Error::validation("Filename must not contain path separators"));
    }
    if bytes.is_empty() {
        return Err(Error::validation("File is empty"));
    }
    Ok(())
}
