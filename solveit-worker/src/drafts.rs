//! Media cleanup for abandoned task drafts

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info};

use solveit_core::models::TaskDraft;
use solveit_core::repository::DraftStore;
use solveit_core::storage::ObjectStorage;
use solveit_core::Result;

use crate::scheduler::Job;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DraftCleanupReport {
    pub scanned: usize,
    pub cleared: usize,
    pub failed: usize,
}

pub struct DraftMediaCleaner {
    drafts: Arc<dyn DraftStore>,
    storage: Arc<dyn ObjectStorage>,
    retention: Duration,
}

impl DraftMediaCleaner {
    #[must_use]
    pub fn new(
        drafts: Arc<dyn DraftStore>,
        storage: Arc<dyn ObjectStorage>,
        retention: Duration,
    ) -> Self {
        Self {
            drafts,
            storage,
            retention,
        }
    }

    /// Delete the uploads of drafts untouched for the retention window, then
    /// clear their file lists
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<DraftCleanupReport> {
        let cutoff = now
            .checked_sub_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let drafts = self.drafts.fetch_stale_drafts(cutoff).await?;

        let mut report = DraftCleanupReport {
            scanned: drafts.len(),
            ..DraftCleanupReport::default()
        };
        for cleared in join_all(drafts.iter().map(|draft| self.clean(draft))).await {
            if cleared {
                report.cleared += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(report)
    }

    /// The file list is only cleared once every object is gone, so a failed
    /// delete is retried on the next run.
    async fn clean(&self, draft: &TaskDraft) -> bool {
        for path in draft.file_paths() {
            if let Err(e) = self.storage.delete(path).await {
                error!(draft_id = %draft.id, path = %path, error = %e, "Failed to delete draft media");
                return false;
            }
        }
        if let Err(e) = self.drafts.clear_draft_files(draft.id).await {
            error!(draft_id = %draft.id, error = %e, "Failed to reset draft files");
            return false;
        }
        true
    }
}

#[async_trait]
impl Job for DraftMediaCleaner {
    fn name(&self) -> &'static str {
        "draft_media_cleanup"
    }

    async fn run(&self) -> Result<()> {
        let report = self.run_at(Utc::now()).await?;
        info!(
            scanned = report.scanned,
            cleared = report.cleared,
            failed = report.failed,
            "Draft media cleanup finished"
        );
        Ok(())
    }
}
