//! Object storage and file-table reconciliation.
//!
//! Two sweeps run side by side. The object sweep deletes stored objects no
//! file table references. The record sweep deletes file rows whose object
//! is gone. Nothing is locked between reading and acting, so a run may miss
//! changes made meanwhile; the next run picks them up.

use async_trait::async_trait;
use futures::TryStreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use solveit_core::models::FileTable;
use solveit_core::repository::FileRecordStore;
use solveit_core::storage::ObjectStorage;
use solveit_core::Result;

use crate::scheduler::Job;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct ReconcileReport {
    pub objects: Result<SweepStats>,
    pub records: SweepStats,
}

pub struct FileReconciler {
    records: Arc<dyn FileRecordStore>,
    storage: Arc<dyn ObjectStorage>,
}

impl FileReconciler {
    #[must_use]
    pub fn new(records: Arc<dyn FileRecordStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { records, storage }
    }

    /// Run both sweeps concurrently and wait for both
    pub async fn reconcile(&self) -> ReconcileReport {
        let (objects, records) = tokio::join!(self.sweep_objects(), self.sweep_records());
        ReconcileReport { objects, records }
    }

    /// Delete every object that no file table references.
    ///
    /// Aborts without deleting anything if the listing or any table fetch
    /// fails.
    pub async fn sweep_objects(&self) -> Result<SweepStats> {
        info!("Starting unreferenced object cleanup");

        let mut listing = self.storage.list("").await?;
        let mut keys = Vec::new();
        while let Some(key) = listing.try_next().await? {
            keys.push(key);
        }

        let mut referenced = HashSet::new();
        for table in FileTable::ALL {
            let paths = self.records.fetch_all_paths(table).await.inspect_err(
                |e| error!(table = %table, error = %e, "Failed to fetch file paths"),
            )?;
            referenced.extend(paths);
        }

        let mut stats = SweepStats {
            scanned: keys.len(),
            ..SweepStats::default()
        };
        for key in keys.iter().filter(|key| !referenced.contains(*key)) {
            match self.storage.delete(key).await {
                Ok(()) => {
                    info!(key = %key, "Deleted unreferenced object");
                    stats.deleted += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to delete unreferenced object");
                    stats.failed += 1;
                }
            }
        }

        info!(
            scanned = stats.scanned,
            deleted = stats.deleted,
            failed = stats.failed,
            "Unreferenced object cleanup completed"
        );
        Ok(stats)
    }

    /// Delete file rows whose object no longer exists. A table that cannot
    /// be read is skipped; a path whose existence cannot be determined is
    /// kept.
    pub async fn sweep_records(&self) -> SweepStats {
        info!("Starting missing object record cleanup");
        let mut stats = SweepStats::default();

        for table in FileTable::ALL {
            let paths = match self.records.fetch_all_paths(table).await {
                Ok(paths) => paths,
                Err(e) => {
                    error!(table = %table, error = %e, "Failed to fetch file paths");
                    stats.failed += 1;
                    continue;
                }
            };

            let mut deleted = 0;
            for path in &paths {
                match self.storage.exists(path).await {
                    Ok(true) => {}
                    Ok(false) => match self.records.delete_path_record(table, path).await {
                        Ok(_) => {
                            info!(table = %table, path = %path, "Object missing, deleted record");
                            deleted += 1;
                        }
                        Err(e) => {
                            warn!(table = %table, path = %path, error = %e, "Failed to delete record");
                            stats.failed += 1;
                        }
                    },
                    Err(e) => {
                        warn!(path = %path, error = %e, "Could not probe object, keeping record");
                        stats.failed += 1;
                    }
                }
            }

            info!(table = %table, found = paths.len(), deleted, "Table record sweep finished");
            stats.scanned += paths.len();
            stats.deleted += deleted;
        }

        stats
    }
}

#[async_trait]
impl Job for FileReconciler {
    fn name(&self) -> &'static str {
        "file_reconciler"
    }

    async fn run(&self) -> Result<()> {
        let report = self.reconcile().await;
        let records = report.records;
        match &report.objects {
            Ok(objects) => info!(
                objects_scanned = objects.scanned,
                objects_deleted = objects.deleted,
                objects_failed = objects.failed,
                records_scanned = records.scanned,
                records_deleted = records.deleted,
                records_failed = records.failed,
                "Garbage collection cycle finished"
            ),
            Err(e) => warn!(
                error = %e,
                records_scanned = records.scanned,
                records_deleted = records.deleted,
                records_failed = records.failed,
                "Garbage collection cycle finished without object sweep"
            ),
        }
        report.objects.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use solveit_core::repository::MemoryStore;
    use solveit_core::storage::MemoryStorage;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_cycle_log_reports_both_sweeps() {
        let storage = MemoryStorage::new();
        for key in ["tasks/a.pdf", "tmp/orphan.png"] {
            storage
                .put(key, Bytes::from_static(b"data"), "application/octet-stream")
                .await
                .unwrap();
        }
        let store = MemoryStore::new();
        store.set_file_paths(FileTable::TaskFiles, ["tasks/a.pdf", "tasks/gone.pdf"]);

        let reconciler = FileReconciler::new(Arc::new(store), Arc::new(storage));
        reconciler.run().await.unwrap();

        assert!(logs_contain("objects_scanned=2"));
        assert!(logs_contain("objects_deleted=1"));
        assert!(logs_contain("records_scanned=2"));
        assert!(logs_contain("records_deleted=1"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_cycle_log_keeps_record_counts_when_object_sweep_aborts() {
        let storage = MemoryStorage::new();
        storage.fail_list(true);
        let store = MemoryStore::new();
        store.set_file_paths(FileTable::ChatFiles, ["chat/gone.png"]);

        let reconciler = FileReconciler::new(Arc::new(store), Arc::new(storage));
        assert!(reconciler.run().await.is_err());

        assert!(logs_contain("without object sweep"));
        assert!(logs_contain("records_deleted=1"));
    }
}
