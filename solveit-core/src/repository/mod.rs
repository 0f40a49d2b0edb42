//! Persistence seams used by the background jobs
//!
//! Each trait has a Postgres implementation (sqlx) and an in-memory one in
//! [`memory`] for tests.

pub mod draft;
pub mod file;
pub mod memory;
pub mod task;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    BlockListEntry, CreateNotificationRequest, DraftId, FileTable, Notification, Task, TaskDraft,
    TaskId, UserId,
};
use crate::Result;

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Up to `limit` assigned tasks with a solver and an assignment time
    async fn fetch_available_tasks(&self, limit: i64) -> Result<Vec<Task>>;

    /// Insert-or-ignore a block-list entry. `None` means the pair was
    /// already blocked and nothing was written.
    async fn block_solver(
        &self,
        user_id: UserId,
        task_id: TaskId,
        reason: &str,
    ) -> Result<Option<BlockListEntry>>;

    /// Remove a block-list entry written by a run that could not finish
    async fn unblock_solver(&self, user_id: UserId, task_id: TaskId) -> Result<()>;

    async fn begin(&self) -> Result<Box<dyn TaskTransaction>>;
}

/// Writes that must land together or not at all
#[async_trait]
pub trait TaskTransaction: Send {
    async fn create_notification(&mut self, req: &CreateNotificationRequest) -> Result<Notification>;

    /// Clear the solver and assignment time and reopen the task
    async fn reset_task(&mut self, task_id: TaskId) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait FileRecordStore: Send + Sync {
    async fn fetch_all_paths(&self, table: FileTable) -> Result<Vec<String>>;

    /// Delete every row of `table` pointing at `path`, returning the row count
    async fn delete_path_record(&self, table: FileTable, path: &str) -> Result<u64>;
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Drafts with attached files, last touched before `older_than`
    async fn fetch_stale_drafts(&self, older_than: DateTime<Utc>) -> Result<Vec<TaskDraft>>;

    async fn clear_draft_files(&self, draft_id: DraftId) -> Result<()>;
}

pub use draft::DraftRepository;
pub use file::FileRecordRepository;
pub use memory::MemoryStore;
pub use task::TaskRepository;
