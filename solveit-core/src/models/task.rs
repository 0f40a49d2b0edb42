//! Task models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::id::{TaskId, UserId};

/// Task lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Open,
    Assigned,
    Completed,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Assigned => "ASSIGNED",
            Self::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "ASSIGNED" => Ok(Self::Assigned),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(anyhow::anyhow!("Invalid task status: {s}")),
        }
    }
}

/// A task as seen by the deadline job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub solver_id: Option<UserId>,
    /// Relative deadline such as `24h`, `3d`, `2w`, `1m` or `1y`
    pub deadline: String,
    pub assigned_at: Option<DateTime<Utc>>,
    pub status: TaskStatus,
}

impl Task {
    /// True while a solver holds the task
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        matches!(self.status, TaskStatus::Assigned) && self.solver_id.is_some()
    }

    /// Return the task to the pool: no solver, no assignment time
    pub fn reset(&mut self) {
        self.solver_id = None;
        self.assigned_at = None;
        self.status = TaskStatus::Open;
    }
}

/// A (solver, task) pair barred from further submissions
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlockListEntry {
    pub id: uuid::Uuid,
    pub user_id: UserId,
    pub task_id: TaskId,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_mapping() {
        assert_eq!(TaskStatus::Assigned.to_string(), "ASSIGNED");
        assert_eq!("OPEN".parse::<TaskStatus>().unwrap(), TaskStatus::Open);
        assert!("open".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_reset_clears_assignment() {
        let mut task = Task {
            id: TaskId::new(),
            title: "Graph homework".to_string(),
            solver_id: Some(UserId::new()),
            deadline: "24h".to_string(),
            assigned_at: Some(Utc::now()),
            status: TaskStatus::Assigned,
        };
        assert!(task.is_assigned());

        task.reset();
        assert!(!task.is_assigned());
        assert!(task.assigned_at.is_none());
        assert_eq!(task.status, TaskStatus::Open);
    }
}
