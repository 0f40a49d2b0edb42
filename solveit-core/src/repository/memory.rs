// In-memory persistence
//
// Implements every repository trait over a single shared state so tests can
// wire the background jobs without Postgres. Transactions stage their writes
// and apply them only on commit; faults can be injected per operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::{DraftStore, FileRecordStore, TaskStore, TaskTransaction};
use crate::models::{
    BlockListEntry, CreateNotificationRequest, DraftId, FileTable, Notification, Task, TaskDraft,
    TaskId, UserId,
};
use crate::{Error, Result};

#[derive(Default)]
struct Faults {
    block_solver: bool,
    create_notification: bool,
    reset_task: bool,
    fetch_paths: HashSet<FileTable>,
    clear_draft: HashSet<DraftId>,
}

#[derive(Default)]
struct State {
    tasks: BTreeMap<TaskId, Task>,
    block_list: Vec<BlockListEntry>,
    notifications: Vec<Notification>,
    file_paths: HashMap<FileTable, Vec<String>>,
    drafts: BTreeMap<DraftId, TaskDraft>,
    faults: Faults,
    commits: usize,
    rollbacks: usize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_task(&self, task: Task) {
        self.state.lock().tasks.insert(task.id, task);
    }

    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.state.lock().tasks.get(&id).cloned()
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().notifications.clone()
    }

    #[must_use]
    pub fn block_list(&self) -> Vec<BlockListEntry> {
        self.state.lock().block_list.clone()
    }

    pub fn set_file_paths<I, S>(&self, table: FileTable, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths = paths.into_iter().map(Into::into).collect();
        self.state.lock().file_paths.insert(table, paths);
    }

    #[must_use]
    pub fn file_paths(&self, table: FileTable) -> Vec<String> {
        self.state
            .lock()
            .file_paths
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn insert_draft(&self, draft: TaskDraft) {
        self.state.lock().drafts.insert(draft.id, draft);
    }

    #[must_use]
    pub fn draft(&self, id: DraftId) -> Option<TaskDraft> {
        self.state.lock().drafts.get(&id).cloned()
    }

    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.state.lock().commits
    }

    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.state.lock().rollbacks
    }

    pub fn fail_block_solver(&self, fail: bool) {
        self.state.lock().faults.block_solver = fail;
    }

    pub fn fail_create_notification(&self, fail: bool) {
        self.state.lock().faults.create_notification = fail;
    }

    pub fn fail_reset_task(&self, fail: bool) {
        self.state.lock().faults.reset_task = fail;
    }

    pub fn fail_fetch_paths(&self, table: FileTable) {
        self.state.lock().faults.fetch_paths.insert(table);
    }

    pub fn fail_clear_draft(&self, id: DraftId) {
        self.state.lock().faults.clear_draft.insert(id);
    }

    fn injected(op: &str) -> Error {
        Error::Internal(format!("injected {op} failure"))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn fetch_available_tasks(&self, limit: i64) -> Result<Vec<Task>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let state = self.state.lock();

        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.is_assigned() && t.assigned_at.is_some())
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.assigned_at);
        tasks.truncate(limit);
        Ok(tasks)
    }

    async fn block_solver(
        &self,
        user_id: UserId,
        task_id: TaskId,
        reason: &str,
    ) -> Result<Option<BlockListEntry>> {
        let mut state = self.state.lock();
        if state.faults.block_solver {
            return Err(Self::injected("block_solver"));
        }

        let exists = state
            .block_list
            .iter()
            .any(|e| e.user_id == user_id && e.task_id == task_id);
        if exists {
            return Ok(None);
        }

        let entry = BlockListEntry {
            id: uuid::Uuid::new_v4(),
            user_id,
            task_id,
            reason: Some(reason.to_string()),
            created_at: Utc::now(),
        };
        state.block_list.push(entry.clone());
        Ok(Some(entry))
    }

    async fn unblock_solver(&self, user_id: UserId, task_id: TaskId) -> Result<()> {
        self.state
            .lock()
            .block_list
            .retain(|e| !(e.user_id == user_id && e.task_id == task_id));
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn TaskTransaction>> {
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            notifications: Vec::new(),
            resets: Vec::new(),
        }))
    }
}

/// Staged writes, applied to the store on commit
pub struct MemoryTransaction {
    state: Arc<Mutex<State>>,
    notifications: Vec<Notification>,
    resets: Vec<TaskId>,
}

#[async_trait]
impl TaskTransaction for MemoryTransaction {
    async fn create_notification(&mut self, req: &CreateNotificationRequest) -> Result<Notification> {
        if self.state.lock().faults.create_notification {
            return Err(MemoryStore::injected("create_notification"));
        }
        let notification = req.clone().into_notification(Utc::now());
        self.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn reset_task(&mut self, task_id: TaskId) -> Result<()> {
        let state = self.state.lock();
        if state.faults.reset_task {
            return Err(MemoryStore::injected("reset_task"));
        }
        if !state.tasks.contains_key(&task_id) {
            return Err(Error::NotFound(format!("task {task_id}")));
        }
        drop(state);

        self.resets.push(task_id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self {
            state,
            notifications,
            resets,
        } = *self;
        let mut state = state.lock();

        state.notifications.extend(notifications);
        for id in resets {
            if let Some(task) = state.tasks.get_mut(&id) {
                task.reset();
            }
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.state.lock().rollbacks += 1;
        Ok(())
    }
}

#[async_trait]
impl FileRecordStore for MemoryStore {
    async fn fetch_all_paths(&self, table: FileTable) -> Result<Vec<String>> {
        let state = self.state.lock();
        if state.faults.fetch_paths.contains(&table) {
            return Err(Self::injected("fetch_all_paths"));
        }
        Ok(state.file_paths.get(&table).cloned().unwrap_or_default())
    }

    async fn delete_path_record(&self, table: FileTable, path: &str) -> Result<u64> {
        let mut state = self.state.lock();
        let Some(paths) = state.file_paths.get_mut(&table) else {
            return Ok(0);
        };
        let before = paths.len();
        paths.retain(|p| p != path);
        Ok((before - paths.len()) as u64)
    }
}

#[async_trait]
impl DraftStore for MemoryStore {
    async fn fetch_stale_drafts(&self, older_than: DateTime<Utc>) -> Result<Vec<TaskDraft>> {
        Ok(self
            .state
            .lock()
            .drafts
            .values()
            .filter(|d| d.updated_at < older_than && !d.uploaded_files.is_empty())
            .cloned()
            .collect())
    }

    async fn clear_draft_files(&self, draft_id: DraftId) -> Result<()> {
        let mut state = self.state.lock();
        if state.faults.clear_draft.contains(&draft_id) {
            return Err(Self::injected("clear_draft_files"));
        }
        let draft = state
            .drafts
            .get_mut(&draft_id)
            .ok_or_else(|| Error::NotFound(format!("draft {draft_id}")))?;
        draft.uploaded_files.clear();
        Ok(())
    }
}
