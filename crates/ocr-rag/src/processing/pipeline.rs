//! Per-file ingestion pipeline
//!
//! Extraction decides the terminal state. Text persistence and vector
//! indexing are best-effort stages: their failures are logged and never turn
//! `done` into `failed`.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ingestion::{PageTexts, TextExtractor};
use crate::providers::{StateStore, TextStore};
use crate::retrieval::PageIndex;
use crate::types::{FileId, ParsingState};

use super::dispatcher::JobRunner;
use super::job::ExtractionJob;

/// Summary of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub file_id: FileId,
    /// Terminal state written, or `None` when the job was dropped because
    /// its file was no longer queued
    pub state: Option<ParsingState>,
    /// Pages returned by extraction, blank ones included
    pub pages_extracted: usize,
    pub pages_saved: usize,
    pub pages_indexed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestReport {
    fn without_pages(file_id: FileId, state: Option<ParsingState>, error: String) -> Self {
        Self {
            file_id,
            state,
            pages_extracted: 0,
            pages_saved: 0,
            pages_indexed: 0,
            error: Some(error),
        }
    }
}

/// Extraction, text persistence, indexing and state transitions for one file
pub struct IngestionPipeline {
    state_store: Arc<dyn StateStore>,
    text_store: Arc<dyn TextStore>,
    extractor: Arc<dyn TextExtractor>,
    index: Arc<PageIndex>,
    extraction_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(
        state_store: Arc<dyn StateStore>,
        text_store: Arc<dyn TextStore>,
        extractor: Arc<dyn TextExtractor>,
        index: Arc<PageIndex>,
        extraction_timeout: Duration,
    ) -> Self {
        Self {
            state_store,
            text_store,
            extractor,
            index,
            extraction_timeout,
        }
    }

    /// Run every stage for one job and settle its terminal state
    ///
    /// Only extraction runs under the timeout. A job whose file can no
    /// longer move to `parsing` (deleted, or already settled) is dropped
    /// without touching text or vectors.
    pub async fn process(&self, job: &ExtractionJob) -> IngestReport {
        let file_id = job.file_id;
        let started = std::time::Instant::now();
        tracing::info!(file_id, filename = %job.filename, bytes = job.data.len(), "Starting extraction");

        match self.state_store.set_state(file_id, ParsingState::Parsing).await {
            Ok(true) => tracing::debug!(file_id, "State updated to parsing"),
            Ok(false) => {
                tracing::warn!(file_id, "File is no longer queued, dropping job");
                return IngestReport::without_pages(file_id, None, "file is no longer queued".into());
            }
            Err(e) => {
                tracing::warn!(file_id, error = %e, "Failed to write parsing state, continuing");
            }
        }

        let extracted = match tokio::time::timeout(self.extraction_timeout, self.extract(job)).await {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => {
                tracing::error!(file_id, filename = %job.filename, error = %e, "Extraction failed");
                return self.settle_failed(file_id, e.to_string()).await;
            }
            Err(_) => {
                tracing::error!(
                    file_id,
                    filename = %job.filename,
                    timeout_secs = self.extraction_timeout.as_secs(),
                    "TIMEOUT extracting file"
                );
                job.cancel.cancel();
                let reason = format!(
                    "Extraction timed out after {}s",
                    self.extraction_timeout.as_secs()
                );
                return self.settle_failed(file_id, reason).await;
            }
        };

        let pages_extracted = extracted.len();
        let pages: Vec<(u32, String)> = extracted
            .into_iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .collect();

        let pages_saved = self.save_pages(file_id, &pages).await;
        let pages_indexed = self.index_pages(file_id, &job.filename, &pages).await;

        self.transition(file_id, ParsingState::Done).await;

        tracing::info!(
            file_id,
            pages_extracted,
            pages_saved,
            pages_indexed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extraction complete"
        );

        IngestReport {
            file_id,
            state: Some(ParsingState::Done),
            pages_extracted,
            pages_saved,
            pages_indexed,
            error: None,
        }
    }

    /// Mark a job that never finished as failed
    pub async fn fail(&self, file_id: FileId, reason: &str) {
        tracing::error!(file_id, %reason, "Marking file as failed");
        self.transition(file_id, ParsingState::Failed).await;
    }

    /// Re-index a finished file from its persisted page text
    ///
    /// Extraction is not repeated. Old points are removed first so pages that
    /// no longer exist do not linger. If the file is deleted while indexing,
    /// the points just written are removed again and `NotFound` is returned.
    pub async fn reindex(&self, file_id: FileId) -> Result<usize> {
        let file = self
            .state_store
            .get_file(file_id)
            .await?
            .ok_or(Error::NotFound(file_id))?;

        if !file.parsing_state.is_terminal() {
            return Err(Error::validation(format!(
                "File {} is {}; wait until parsing finishes",
                file_id, file.parsing_state
            )));
        }

        let pages: Vec<(u32, String)> = self
            .text_store
            .get_pages(file_id)
            .await?
            .into_iter()
            .map(|p| (p.page_number, p.text))
            .collect();

        let removed = self.index.delete_all_for_file(file_id).await?;
        let indexed = self.index_pages(file_id, &file.filename, &pages).await;

        if self.state_store.get_state(file_id).await?.is_none() {
            tracing::warn!(file_id, "File deleted during re-index, removing its points");
            self.index.delete_all_for_file(file_id).await?;
            return Err(Error::NotFound(file_id));
        }

        tracing::info!(file_id, removed, indexed, pages = pages.len(), "Re-indexed file");
        Ok(indexed)
    }

    async fn settle_failed(&self, file_id: FileId, error: String) -> IngestReport {
        self.transition(file_id, ParsingState::Failed).await;
        IngestReport::without_pages(file_id, Some(ParsingState::Failed), error)
    }

    async fn extract(&self, job: &ExtractionJob) -> Result<PageTexts> {
        let extractor = self.extractor.clone();
        let data = job.data.clone();
        let filename = job.filename.clone();
        let cancel = job.cancel.clone();

        tokio::task::spawn_blocking(move || extractor.extract(&data, &filename, &cancel))
            .await
            .map_err(|e| Error::Internal(format!("Extraction task failed: {}", e)))?
    }

    /// Persist non-blank pages; returns how many were written
    async fn save_pages(&self, file_id: FileId, pages: &[(u32, String)]) -> usize {
        let mut saved = 0;
        for (page, text) in pages {
            match self.text_store.upsert_page(file_id, *page, text).await {
                Ok(_) => saved += 1,
                Err(e) => {
                    tracing::warn!(file_id, page, error = %e, "Failed to save page text, continuing");
                }
            }
        }
        saved
    }

    /// Index pages one by one; returns how many were written
    pub async fn index_pages(&self, file_id: FileId, filename: &str, pages: &[(u32, String)]) -> usize {
        let mut indexed = 0;
        for (page, text) in pages {
            match self.index.upsert(file_id, *page, text, filename).await {
                Ok(()) => {
                    indexed += 1;
                    tracing::debug!(file_id, page, "Indexed page");
                }
                Err(e) => {
                    tracing::warn!(file_id, page, error = %e, "Failed to index page, continuing");
                }
            }
        }
        indexed
    }

    /// Best-effort state write
    async fn transition(&self, file_id: FileId, state: ParsingState) {
        match self.state_store.set_state(file_id, state).await {
            Ok(true) => tracing::debug!(file_id, %state, "State updated"),
            Ok(false) => tracing::warn!(file_id, %state, "State transition refused"),
            Err(e) => tracing::warn!(file_id, %state, error = %e, "Failed to write state"),
        }
    }
}

#[async_trait]
impl JobRunner for IngestionPipeline {
    async fn run(&self, job: &ExtractionJob) {
        self.process(job).await;
    }

    async fn abandon(&self, job: &ExtractionJob, reason: &str) {
        self.fail(job.file_id, reason).await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ingestion::CancelFlag;
    use crate::providers::{
        LocalVectorStore, ScoredPoint, SparseVector, VectorPoint, VectorStoreProvider,
    };
    use crate::retrieval::index::tests::LetterEmbedder;
    use crate::storage::SqliteStore;
    use crate::processing::Dispatcher;
    use crate::types::FileRecord;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    /// Extractor returning fixed pages, or failing for unknown extensions
    pub(crate) struct FixedExtractor {
        pub pages: Vec<(u32, &'static str)>,
    }

    impl TextExtractor for FixedExtractor {
        fn extract(&self, _data: &[u8], filename: &str, _cancel: &CancelFlag) -> Result<PageTexts> {
            crate::ingestion::DocumentFormat::from_filename(filename)?;
            Ok(self
                .pages
                .iter()
                .map(|(n, t)| (*n, t.to_string()))
                .collect())
        }
    }

    /// Extractor that blocks until its job is cancelled
    struct StalledExtractor;

    impl TextExtractor for StalledExtractor {
        fn extract(&self, _data: &[u8], _filename: &str, cancel: &CancelFlag) -> Result<PageTexts> {
            for _ in 0..400 {
                if cancel.is_cancelled() {
                    return Err(Error::extraction("Cancelled"));
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(PageTexts::new())
        }
    }

    /// Text store whose writes always fail
    struct FailingTextStore;

    #[async_trait]
    impl TextStore for FailingTextStore {
        async fn upsert_page(&self, _file_id: FileId, _page_number: u32, _text: &str) -> Result<i64> {
            Err(Error::store("disk full"))
        }
        async fn get_pages(&self, _file_id: FileId) -> Result<Vec<crate::types::PageText>> {
            Ok(Vec::new())
        }
    }

    /// Text store that deletes the file right after handing out its pages
    struct DeletingTextStore {
        store: Arc<RecordingStore>,
    }

    #[async_trait]
    impl TextStore for DeletingTextStore {
        async fn upsert_page(&self, file_id: FileId, page_number: u32, text: &str) -> Result<i64> {
            self.store.inner.upsert_page_text(file_id, page_number, text)
        }
        async fn get_pages(&self, file_id: FileId) -> Result<Vec<crate::types::PageText>> {
            let pages = self.store.inner.page_texts(file_id)?;
            self.store.delete_file(file_id).await?;
            Ok(pages)
        }
    }

    /// Local vector store with a delay on every write
    struct SlowVectorStore {
        inner: LocalVectorStore,
        delay: Duration,
    }

    #[async_trait]
    impl VectorStoreProvider for SlowVectorStore {
        async fn upsert_point(&self, point: VectorPoint) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.upsert_point(point).await
        }
        async fn search_dense(&self, v: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
            self.inner.search_dense(v, limit).await
        }
        async fn search_sparse(&self, v: &SparseVector, limit: usize) -> Result<Vec<ScoredPoint>> {
            self.inner.search_sparse(v, limit).await
        }
        async fn delete_by_file(&self, file_id: FileId) -> Result<usize> {
            self.inner.delete_by_file(file_id).await
        }
        async fn count_by_file(&self, file_id: FileId) -> Result<usize> {
            self.inner.count_by_file(file_id).await
        }
        async fn len(&self) -> Result<usize> {
            self.inner.len().await
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        fn name(&self) -> &str {
            "slow"
        }
    }

    /// Vector store whose writes always fail
    struct FailingVectorStore;

    #[async_trait]
    impl VectorStoreProvider for FailingVectorStore {
        async fn upsert_point(&self, _point: VectorPoint) -> Result<()> {
            Err(Error::indexing("vector index unavailable"))
        }
        async fn search_dense(&self, _v: &[f32], _limit: usize) -> Result<Vec<ScoredPoint>> {
            Ok(Vec::new())
        }
        async fn search_sparse(&self, _v: &SparseVector, _limit: usize) -> Result<Vec<ScoredPoint>> {
            Ok(Vec::new())
        }
        async fn delete_by_file(&self, _file_id: FileId) -> Result<usize> {
            Ok(0)
        }
        async fn count_by_file(&self, _file_id: FileId) -> Result<usize> {
            Ok(0)
        }
        async fn len(&self) -> Result<usize> {
            Ok(0)
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    /// State store that records every accepted transition
    pub(crate) struct RecordingStore {
        pub inner: SqliteStore,
        pub history: Mutex<Vec<(FileId, ParsingState)>>,
    }

    impl RecordingStore {
        pub(crate) fn new() -> Self {
            Self {
                inner: SqliteStore::in_memory().unwrap(),
                history: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn states_of(&self, file_id: FileId) -> Vec<ParsingState> {
            let mut states = vec![ParsingState::Pending];
            states.extend(
                self.history
                    .lock()
                    .iter()
                    .filter(|(id, _)| *id == file_id)
                    .map(|(_, s)| *s),
            );
            states
        }
    }

    #[async_trait]
    impl StateStore for RecordingStore {
        async fn create_file(&self, filename: &str, data: &[u8]) -> Result<FileRecord> {
            self.inner.create_file(filename, data).await
        }
        async fn get_file(&self, file_id: FileId) -> Result<Option<FileRecord>> {
            self.inner.get_file(file_id).await
        }
        async fn get_blob(&self, file_id: FileId) -> Result<Option<Vec<u8>>> {
            self.inner.get_blob(file_id).await
        }
        async fn get_state(&self, file_id: FileId) -> Result<Option<ParsingState>> {
            self.inner.get_state(file_id).await
        }
        async fn set_state(&self, file_id: FileId, state: ParsingState) -> Result<bool> {
            let applied = self.inner.set_state(file_id, state).await?;
            if applied {
                self.history.lock().push((file_id, state));
            }
            Ok(applied)
        }
        async fn count_active(&self) -> Result<usize> {
            self.inner.count_active().await
        }
        async fn get_all_metadata(&self) -> Result<Vec<FileRecord>> {
            self.inner.get_all_metadata().await
        }
        async fn delete_file(&self, file_id: FileId) -> Result<bool> {
            self.inner.delete_file(file_id).await
        }
        fn name(&self) -> &str {
            "recording"
        }
    }

    struct Fixture {
        store: Arc<RecordingStore>,
        vectors: Arc<dyn VectorStoreProvider>,
        pipeline: IngestionPipeline,
    }

    fn fixture(pages: Vec<(u32, &'static str)>, vectors: Arc<dyn VectorStoreProvider>) -> Fixture {
        let store = Arc::new(RecordingStore::new());
        let text_store = Arc::new(store.inner.clone());
        build_fixture(store, text_store, Arc::new(FixedExtractor { pages }), vectors, Duration::from_secs(5))
    }

    fn build_fixture(
        store: Arc<RecordingStore>,
        text_store: Arc<dyn TextStore>,
        extractor: Arc<dyn TextExtractor>,
        vectors: Arc<dyn VectorStoreProvider>,
        extraction_timeout: Duration,
    ) -> Fixture {
        let index = Arc::new(PageIndex::new(Arc::new(LetterEmbedder::new(26)), vectors.clone(), 500));
        let pipeline = IngestionPipeline::new(store.clone(), text_store, extractor, index, extraction_timeout);
        Fixture {
            store,
            vectors,
            pipeline,
        }
    }

    fn queued_job(store: &RecordingStore, filename: &str) -> ExtractionJob {
        let record = store.inner.insert_file(filename, b"bytes").unwrap();
        store.inner.update_parsing_state(record.id, ParsingState::Queued).unwrap();
        store.history.lock().push((record.id, ParsingState::Queued));
        ExtractionJob::new(record.id, filename, b"bytes".to_vec())
    }

    #[tokio::test]
    async fn test_successful_run() {
        let f = fixture(
            vec![(1, "first page"), (2, "   "), (3, "third page")],
            Arc::new(LocalVectorStore::new(26)),
        );
        let job = queued_job(&f.store, "scan.pdf");

        let report = f.pipeline.process(&job).await;
        assert_eq!(report.state, Some(ParsingState::Done));
        assert_eq!(report.pages_extracted, 3);
        assert_eq!(report.pages_saved, 2);
        assert_eq!(report.pages_indexed, 2);

        let pages = f.store.inner.page_texts(job.file_id).unwrap();
        assert_eq!(pages.iter().map(|p| p.page_number).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(f.vectors.count_by_file(job.file_id).await.unwrap(), 2);

        assert_eq!(
            f.store.states_of(job.file_id),
            vec![ParsingState::Pending, ParsingState::Queued, ParsingState::Parsing, ParsingState::Done]
        );
    }

    #[tokio::test]
    async fn test_indexing_failure_still_done() {
        let f = fixture(vec![(1, "page one text")], Arc::new(FailingVectorStore));
        let job = queued_job(&f.store, "scan.png");

        let report = f.pipeline.process(&job).await;
        assert_eq!(report.state, Some(ParsingState::Done));
        assert_eq!(report.pages_indexed, 0);

        let pages = f.store.inner.page_texts(job.file_id).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text, "page one text");
        assert_eq!(f.store.inner.parsing_state(job.file_id).unwrap(), Some(ParsingState::Done));
    }

    #[tokio::test]
    async fn test_empty_extraction_is_done() {
        let f = fixture(Vec::new(), Arc::new(LocalVectorStore::new(26)));
        let job = queued_job(&f.store, "blank.pdf");

        let report = f.pipeline.process(&job).await;
        assert_eq!(report.state, Some(ParsingState::Done));
        assert!(f.store.inner.page_texts(job.file_id).unwrap().is_empty());
        assert_eq!(f.vectors.count_by_file(job.file_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_format_fails() {
        let f = fixture(vec![(1, "never saved")], Arc::new(LocalVectorStore::new(26)));
        let job = queued_job(&f.store, "notes.txt");

        let report = f.pipeline.process(&job).await;
        assert_eq!(report.state, Some(ParsingState::Failed));
        assert!(report.error.unwrap().contains("Unsupported"));
        assert!(f.store.inner.page_texts(job.file_id).unwrap().is_empty());
        assert_eq!(
            f.store.states_of(job.file_id),
            vec![ParsingState::Pending, ParsingState::Queued, ParsingState::Parsing, ParsingState::Failed]
        );
    }

    #[tokio::test]
    async fn test_reindex_replays_saved_text() {
        let vectors: Arc<dyn VectorStoreProvider> = Arc::new(LocalVectorStore::new(26));
        let f = fixture(vec![(1, "alpha"), (2, "beta")], vectors.clone());
        let job = queued_job(&f.store, "scan.pdf");
        f.pipeline.process(&job).await;

        assert_ok!(vectors.delete_by_file(job.file_id).await);
        assert_eq!(vectors.count_by_file(job.file_id).await.unwrap(), 0);

        assert_eq!(assert_ok!(f.pipeline.reindex(job.file_id).await), 2);
        assert_eq!(vectors.count_by_file(job.file_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reindex_requires_finished_file() {
        let f = fixture(vec![(1, "alpha")], Arc::new(LocalVectorStore::new(26)));
        let job = queued_job(&f.store, "scan.pdf");

        assert!(matches!(assert_err!(f.pipeline.reindex(job.file_id).await), Error::Validation(_)));
        assert!(matches!(assert_err!(f.pipeline.reindex(12345).await), Error::NotFound(12345)));
    }

    #[tokio::test]
    async fn test_fail_marks_failed() {
        let f = fixture(Vec::new(), Arc::new(LocalVectorStore::new(26)));
        let job = queued_job(&f.store, "slow.pdf");

        f.pipeline.fail(job.file_id, "job timed out").await;
        assert_eq!(f.store.inner.parsing_state(job.file_id).unwrap(), Some(ParsingState::Failed));
    }

    #[tokio::test]
    async fn test_text_store_failure_still_done() {
        let store = Arc::new(RecordingStore::new());
        let vectors: Arc<dyn VectorStoreProvider> = Arc::new(LocalVectorStore::new(26));
        let f = build_fixture(
            store,
            Arc::new(FailingTextStore),
            Arc::new(FixedExtractor {
                pages: vec![(1, "invoice header"), (2, "invoice total")],
            }),
            vectors,
            Duration::from_secs(5),
        );
        let job = queued_job(&f.store, "invoice.pdf");

        let report = f.pipeline.process(&job).await;
        assert_eq!(report.state, Some(ParsingState::Done));
        assert_eq!(report.pages_saved, 0);
        assert_eq!(report.pages_indexed, 2);
        assert!(report.error.is_none());
        assert_eq!(f.vectors.count_by_file(job.file_id).await.unwrap(), 2);
        assert_eq!(f.store.inner.parsing_state(job.file_id).unwrap(), Some(ParsingState::Done));
    }

    #[tokio::test]
    async fn test_extraction_timeout_fails_and_cancels() {
        let store = Arc::new(RecordingStore::new());
        let text_store = Arc::new(store.inner.clone());
        let f = build_fixture(
            store,
            text_store,
            Arc::new(StalledExtractor),
            Arc::new(LocalVectorStore::new(26)),
            Duration::from_millis(50),
        );
        let job = queued_job(&f.store, "stuck.pdf");

        let report = f.pipeline.process(&job).await;
        assert_eq!(report.state, Some(ParsingState::Failed));
        assert!(report.error.unwrap().contains("timed out"));
        assert!(job.cancel.is_cancelled());
        assert_eq!(
            f.store.states_of(job.file_id),
            vec![ParsingState::Pending, ParsingState::Queued, ParsingState::Parsing, ParsingState::Failed]
        );
    }

    #[tokio::test]
    async fn test_slow_indexing_is_not_bounded_by_timeout() {
        let store = Arc::new(RecordingStore::new());
        let text_store = Arc::new(store.inner.clone());
        let vectors: Arc<dyn VectorStoreProvider> = Arc::new(SlowVectorStore {
            inner: LocalVectorStore::new(26),
            delay: Duration::from_millis(150),
        });
        let f = build_fixture(
            store,
            text_store,
            Arc::new(FixedExtractor {
                pages: vec![(1, "slow page one"), (2, "slow page two")],
            }),
            vectors,
            Duration::from_millis(200),
        );
        let job = queued_job(&f.store, "slow.pdf");
        let file_id = job.file_id;

        let pipeline = Arc::new(f.pipeline);
        let dispatcher = Dispatcher::with_limits(pipeline, 1, 4);
        assert_ok!(dispatcher.submit(job));
        dispatcher.shutdown().await;

        assert_eq!(
            f.store.states_of(file_id),
            vec![ParsingState::Pending, ParsingState::Queued, ParsingState::Parsing, ParsingState::Done]
        );
        assert_eq!(f.vectors.count_by_file(file_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_job_for_deleted_file_is_dropped() {
        let f = fixture(vec![(1, "orphan one"), (2, "orphan two")], Arc::new(LocalVectorStore::new(26)));
        let job = ExtractionJob::new(777, "gone.pdf", b"bytes".to_vec());

        let report = f.pipeline.process(&job).await;
        assert_eq!(report.state, None);
        assert_eq!(report.pages_indexed, 0);
        assert_eq!(f.vectors.count_by_file(777).await.unwrap(), 0);
        assert!(f.store.inner.page_texts(777).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_job_for_settled_file_is_dropped() {
        let f = fixture(vec![(1, "late text")], Arc::new(LocalVectorStore::new(26)));
        let job = queued_job(&f.store, "settled.pdf");
        f.pipeline.fail(job.file_id, "worker gave up").await;

        let report = f.pipeline.process(&job).await;
        assert_eq!(report.state, None);
        assert_eq!(f.vectors.count_by_file(job.file_id).await.unwrap(), 0);
        assert!(f.store.inner.page_texts(job.file_id).unwrap().is_empty());
        assert_eq!(f.store.inner.parsing_state(job.file_id).unwrap(), Some(ParsingState::Failed));
    }

    #[tokio::test]
    async fn test_reindex_racing_delete_leaves_no_points() {
        let store = Arc::new(RecordingStore::new());
        let vectors: Arc<dyn VectorStoreProvider> = Arc::new(LocalVectorStore::new(26));
        let text_store = Arc::new(DeletingTextStore { store: store.clone() });
        let f = build_fixture(
            store,
            text_store,
            Arc::new(FixedExtractor { pages: Vec::new() }),
            vectors.clone(),
            Duration::from_secs(5),
        );
        let job = queued_job(&f.store, "scan.pdf");
        assert_ok!(f.store.inner.upsert_page_text(job.file_id, 1, "alpha"));
        f.pipeline.fail(job.file_id, "extraction failed").await;

        assert!(matches!(assert_err!(f.pipeline.reindex(job.file_id).await), Error::NotFound(_)));
        assert_eq!(vectors.count_by_file(job.file_id).await.unwrap(), 0);
    }
}
