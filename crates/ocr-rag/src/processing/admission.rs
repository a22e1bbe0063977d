//! Admission control for new extraction jobs
//!
//! At most `limit` files may be `queued` or `parsing` at once. The count read
//! and the `queued` write happen under one process-local lock, so concurrent
//! uploads cannot both take the last slot.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::providers::StateStore;
use crate::types::{FileId, ParsingState};

/// Outcome of an admission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// File is now `queued`; the caller must submit a job
    Accepted,
    /// Nothing was written; the caller must not schedule a job
    Rejected(RejectReason),
}

/// Why a file was not admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    QueueFull { active: usize, limit: usize },
    /// File is missing or not `pending`
    NotPending(Option<ParsingState>),
}

/// Gatekeeper for the active-job limit
pub struct AdmissionController {
    store: Arc<dyn StateStore>,
    limit: usize,
    gate: Mutex<()>,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn StateStore>, limit: usize) -> Self {
        Self {
            store,
            limit,
            gate: Mutex::new(()),
        }
    }

    /// Try to move `file_id` from `pending` to `queued`
    ///
    /// A failed count read is treated as zero active jobs. A failed state
    /// write is returned as an error.
    pub async fn try_admit(&self, file_id: FileId) -> Result<Admission> {
        let _guard = self.gate.lock().await;

        let active = match self.store.count_active().await {
            Ok(active) => active,
            Err(e) => {
                tracing::warn!(
                    file_id,
                    error = %e,
                    "Failed to count active jobs, admitting as if none were active"
                );
                0
            }
        };

        if active >= self.limit {
            tracing::info!(file_id, active, limit = self.limit, "Admission rejected: queue full");
            return Ok(Admission::Rejected(RejectReason::QueueFull {
                active,
                limit: self.limit,
            }));
        }

        if !self.store.set_state(file_id, ParsingState::Queued).await? {
            let current = self.store.get_state(file_id).await.ok().flatten();
            tracing::warn!(file_id, ?current, "Admission rejected: file is not pending");
            return Ok(Admission::Rejected(RejectReason::NotPending(current)));
        }

        tracing::debug!(file_id, active = active + 1, limit = self.limit, "Admitted file");
        Ok(Admission::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::SqliteStore;
    use crate::types::FileRecord;
    use async_trait::async_trait;

    fn store_with_files(n: usize) -> (Arc<SqliteStore>, Vec<FileId>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ids = (0..n)
            .map(|i| store.insert_file(&format!("file-{}.png", i), b"img").unwrap().id)
            .collect();
        (store, ids)
    }

    #[tokio::test]
    async fn test_admits_up_to_limit() {
        let (store, ids) = store_with_files(3);
        let controller = AdmissionController::new(store.clone(), 2);

        assert_eq!(controller.try_admit(ids[0]).await.unwrap(), Admission::Accepted);
        assert_eq!(controller.try_admit(ids[1]).await.unwrap(), Admission::Accepted);
        assert_eq!(
            controller.try_admit(ids[2]).await.unwrap(),
            Admission::Rejected(RejectReason::QueueFull { active: 2, limit: 2 })
        );

        // rejection leaves the file untouched
        assert_eq!(store.parsing_state(ids[2]).unwrap(), Some(ParsingState::Pending));
        assert_eq!(store.active_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_finished_files_free_slots() {
        let (store, ids) = store_with_files(2);
        let controller = AdmissionController::new(store.clone(), 1);

        assert_eq!(controller.try_admit(ids[0]).await.unwrap(), Admission::Accepted);
        store.update_parsing_state(ids[0], ParsingState::Parsing).unwrap();
        store.update_parsing_state(ids[0], ParsingState::Done).unwrap();

        assert_eq!(controller.try_admit(ids[1]).await.unwrap(), Admission::Accepted);
    }

    #[tokio::test]
    async fn test_non_pending_file_is_rejected() {
        let (store, ids) = store_with_files(1);
        let controller = AdmissionController::new(store, 5);

        assert_eq!(controller.try_admit(ids[0]).await.unwrap(), Admission::Accepted);
        assert_eq!(
            controller.try_admit(ids[0]).await.unwrap(),
            Admission::Rejected(RejectReason::NotPending(Some(ParsingState::Queued)))
        );
        assert_eq!(
            controller.try_admit(999).await.unwrap(),
            Admission::Rejected(RejectReason::NotPending(None))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admission_never_exceeds_limit() {
        let (store, ids) = store_with_files(40);
        let controller = Arc::new(AdmissionController::new(store.clone(), 5));

        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let controller = controller.clone();
                tokio::spawn(async move { controller.try_admit(id).await.unwrap() })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() == Admission::Accepted {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 5);
        assert_eq!(store.active_count().unwrap(), 5);
    }

    /// Store whose count query always fails
    struct BrokenCountStore {
        inner: SqliteStore,
    }

    #[async_trait]
    impl StateStore for BrokenCountStore {
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
            self.inner.set_state(file_id, state).await
        }
        async fn count_active(&self) -> Result<usize> {
            Err(Error::store("connection reset"))
        }
        async fn get_all_metadata(&self) -> Result<Vec<FileRecord>> {
            self.inner.get_all_metadata().await
        }
        async fn delete_file(&self, file_id: FileId) -> Result<bool> {
            self.inner.delete_file(file_id).await
        }
        fn name(&self) -> &str {
            "broken-count"
        }
    }

    #[tokio::test]
    async fn test_count_failure_fails_open() {
        let inner = SqliteStore::in_memory().unwrap();
        let a = inner.insert_file("a.png", b"x").unwrap().id;
        let b = inner.insert_file("b.png", b"x").unwrap().id;
        let controller = AdmissionController::new(Arc::new(BrokenCountStore { inner }), 1);

        assert_eq!(controller.try_admit(a).await.unwrap(), Admission::Accepted);
        assert_eq!(controller.try_admit(b).await.unwrap(), Admission::Accepted);
    }
}
