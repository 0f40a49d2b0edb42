use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::{TaskStore, TaskTransaction};
use crate::{
    models::{
        BlockListEntry, CreateNotificationRequest, Notification, Task, TaskId, TaskStatus, UserId,
    },
    Error, Result, UnitOfWork,
};

/// Task repository for database operations
#[derive(Clone, Debug)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &PgRow) -> Result<Task> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse()
            .map_err(|e| Error::Internal(format!("Invalid task status: {e}")))?;

        Ok(Task {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            solver_id: row.try_get("solver_id")?,
            deadline: row.try_get("deadline")?,
            assigned_at: row.try_get("assigned_at")?,
            status,
        })
    }
}

#[async_trait]
impl TaskStore for TaskRepository {
    async fn fetch_available_tasks(&self, limit: i64) -> Result<Vec<Task>> {
        let rows = sqlx::query(
            r"
            SELECT id, title, solver_id, deadline, assigned_at, status
            FROM tasks
            WHERE status = $1
              AND solver_id IS NOT NULL
              AND assigned_at IS NOT NULL
            ORDER BY assigned_at ASC
            LIMIT $2
            ",
        )
        .bind(TaskStatus::Assigned.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn block_solver(
        &self,
        user_id: UserId,
        task_id: TaskId,
        reason: &str,
    ) -> Result<Option<BlockListEntry>> {
        let entry = sqlx::query_as::<_, BlockListEntry>(
            r"
            INSERT INTO blocked_task_solvers (id, user_id, task_id, reason, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, task_id) DO NOTHING
            RETURNING id, user_id, task_id, reason, created_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(task_id)
        .bind(reason)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn unblock_solver(&self, user_id: UserId, task_id: TaskId) -> Result<()> {
        sqlx::query("DELETE FROM blocked_task_solvers WHERE user_id = $1 AND task_id = $2")
            .bind(user_id)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn TaskTransaction>> {
        let uow = UnitOfWork::begin(&self.pool).await?;
        Ok(Box::new(PgTaskTransaction { uow }))
    }
}

/// Task writes bound to one database transaction
pub struct PgTaskTransaction {
    uow: UnitOfWork,
}

#[async_trait]
impl TaskTransaction for PgTaskTransaction {
    async fn create_notification(&mut self, req: &CreateNotificationRequest) -> Result<Notification> {
        let conn = self.uow.connection()?;

        let row = sqlx::query(
            r"
            INSERT INTO notifications (id, sender_id, receiver_id, subject, content, method, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, sender_id, receiver_id, subject, content, method, read, created_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(&req.sender_id)
        .bind(&req.receiver_id)
        .bind(&req.subject)
        .bind(&req.content)
        .bind(req.method.as_str())
        .bind(false)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        let method: String = row.try_get("method")?;
        Ok(Notification {
            id: row.try_get("id")?,
            sender_id: row.try_get("sender_id")?,
            receiver_id: row.try_get("receiver_id")?,
            subject: row.try_get("subject")?,
            content: row.try_get("content")?,
            method: method
                .parse()
                .map_err(|e| Error::Internal(format!("Invalid notification method: {e}")))?,
            read: row.try_get("read")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn reset_task(&mut self, task_id: TaskId) -> Result<()> {
        let conn = self.uow.connection()?;

        let result = sqlx::query(
            r"
            UPDATE tasks
            SET solver_id = NULL, assigned_at = NULL, status = $2, updated_at = $3
            WHERE id = $1
            ",
        )
        .bind(task_id)
        .bind(TaskStatus::Open.as_str())
        .bind(Utc::now())
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("task {task_id}")));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.uow.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.uow.rollback().await
    }
}
