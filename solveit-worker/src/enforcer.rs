//! Deadline enforcement.
//!
//! Each run takes a bounded batch of assigned tasks, and for every task past
//! its deadline: blocks the solver (insert-or-ignore), then in one
//! transaction records a system notification and reopens the task, then
//! pushes the notification to the solver's live connections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use solveit_core::models::{
    CreateNotificationRequest, Notification, NotificationMethod, Task, UserId,
};
use solveit_core::repository::{TaskStore, TaskTransaction};
use solveit_core::Result;
use solveit_hub::relay::{NotificationMessage, NotificationRelay};

use crate::deadline::parse_deadline;
use crate::scheduler::Job;

pub const SYSTEM_SENDER: &str = "solveit@org.com";
pub const BLOCKED_SUBJECT: &str = "Blocked From A Task";
pub const BLOCK_REASON: &str = "Missed Deadline";

/// The notice a solver receives when a missed deadline blocks them
#[must_use]
pub fn blocked_notice(solver_id: UserId, task_title: &str) -> CreateNotificationRequest {
    CreateNotificationRequest {
        sender_id: SYSTEM_SENDER.to_string(),
        receiver_id: solver_id.to_string(),
        subject: Some(BLOCKED_SUBJECT.to_string()),
        content: format!(
            "You are blocked from task: {task_title}. You can no longer submit it but you can still access your previous work."
        ),
        method: NotificationMethod::System,
    }
}

/// Counts for one enforcement run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineReport {
    /// Tasks fetched
    pub checked: usize,
    /// Tasks whose deadline had passed
    pub expired: usize,
    /// Solvers newly blocked with the task reopened
    pub blocked: usize,
    /// Unusable tasks and pairs that were already blocked
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Blocked,
    AlreadyBlocked,
    Failed,
}

#[derive(Clone)]
pub struct DeadlineEnforcer {
    tasks: Arc<dyn TaskStore>,
    notifications: Arc<NotificationRelay>,
    batch_size: u32,
}

impl DeadlineEnforcer {
    #[must_use]
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        notifications: Arc<NotificationRelay>,
        batch_size: u32,
    ) -> Self {
        Self {
            tasks,
            notifications,
            batch_size,
        }
    }

    /// One enforcement pass evaluated against `now`
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<DeadlineReport> {
        let tasks = self
            .tasks
            .fetch_available_tasks(i64::from(self.batch_size))
            .await?;
        let mut report = DeadlineReport {
            checked: tasks.len(),
            ..DeadlineReport::default()
        };

        let mut checks = Vec::new();
        for task in tasks {
            let (Some(solver_id), Some(assigned_at)) = (task.solver_id, task.assigned_at) else {
                warn!(task_id = %task.id, "Skipping task without solver or assignment time");
                report.skipped += 1;
                continue;
            };
            let deadline = match parse_deadline(&task.deadline, assigned_at) {
                Ok(deadline) => deadline,
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "Skipping task with invalid deadline");
                    report.skipped += 1;
                    continue;
                }
            };
            if now < deadline {
                continue;
            }

            report.expired += 1;
            let enforcer = self.clone();
            checks.push(tokio::spawn(async move { enforcer.enforce(task, solver_id).await }));
        }

        for result in join_all(checks).await {
            match result {
                Ok(Outcome::Blocked) => report.blocked += 1,
                Ok(Outcome::AlreadyBlocked) => report.skipped += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Err(e) => {
                    error!(error = %e, "Deadline check task panicked");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn enforce(&self, task: Task, solver_id: UserId) -> Outcome {
        info!(task_id = %task.id, "Deadline passed");

        let entry = match self.tasks.block_solver(solver_id, task.id, BLOCK_REASON).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(task_id = %task.id, solver_id = %solver_id, "Solver already blocked");
                return Outcome::AlreadyBlocked;
            }
            Err(e) => {
                error!(task_id = %task.id, error = %e, "Failed to add solver to block list");
                return Outcome::Failed;
            }
        };
        info!(user_id = %entry.user_id, task_id = %entry.task_id, "Blocked solver from task");

        let notification = match self.notify_and_reset(solver_id, &task).await {
            Ok(notification) => notification,
            Err(e) => {
                error!(task_id = %task.id, error = %e, "Failed to notify solver and reset task");
                // A block without the reset would leave the task assigned and never rechecked.
                if let Err(e) = self.tasks.unblock_solver(solver_id, task.id).await {
                    error!(task_id = %task.id, error = %e, "Failed to remove block-list entry");
                }
                return Outcome::Failed;
            }
        };

        let message = NotificationMessage::from(&notification);
        match self.notifications.send_to_user(solver_id, &message).await {
            Ok(delivered) => debug!(solver_id = %solver_id, delivered, "Pushed block notice"),
            Err(e) => warn!(solver_id = %solver_id, error = %e, "Failed to push block notice"),
        }
        Outcome::Blocked
    }

    async fn notify_and_reset(&self, solver_id: UserId, task: &Task) -> Result<Notification> {
        let mut tx = self.tasks.begin().await?;
        match Self::apply(tx.as_mut(), solver_id, task).await {
            Ok(notification) => {
                tx.commit().await?;
                Ok(notification)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(task_id = %task.id, error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn apply(
        tx: &mut dyn TaskTransaction,
        solver_id: UserId,
        task: &Task,
    ) -> Result<Notification> {
        let notification = tx
            .create_notification(&blocked_notice(solver_id, &task.title))
            .await?;
        tx.reset_task(task.id).await?;
        Ok(notification)
    }
}

#[async_trait]
impl Job for DeadlineEnforcer {
    fn name(&self) -> &'static str {
        "deadline_enforcer"
    }

    async fn run(&self) -> Result<()> {
        let report = self.run_at(Utc::now()).await?;
        info!(
            checked = report.checked,
            expired = report.expired,
            blocked = report.blocked,
            skipped = report.skipped,
            failed = report.failed,
            "Deadline check cycle finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_notice() {
        let solver = UserId::new();
        let notice = blocked_notice(solver, "Fix the parser");
        assert_eq!(notice.sender_id, "solveit@org.com");
        assert_eq!(notice.receiver_id, solver.to_string());
        assert_eq!(notice.subject.as_deref(), Some("Blocked From A Task"));
        assert_eq!(
            notice.content,
            "You are blocked from task: Fix the parser. You can no longer submit it but you can still access your previous work."
        );
        assert_eq!(notice.method, NotificationMethod::System);
    }
}
