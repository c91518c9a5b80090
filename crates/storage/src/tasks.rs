// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task store (C5): CRUD plus the three queries the orchestrator depends on.

use arw_core::task::{TaskKind, TaskPayload, TaskResult, TaskStatus};
use arw_core::{Error, ErrorKind, RequestId, Task, TaskId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::db::{sqlx_err, Db};

#[derive(FromRow)]
struct TaskRow {
    id: String,
    name: String,
    description: Option<String>,
    kind: String,
    status: String,
    attempt_count: i32,
    max_attempts: i32,
    next_execution_time: Option<DateTime<Utc>>,
    delay_seconds: i64,
    payload: serde_json::Value,
    result: Option<serde_json::Value>,
    error_message: Option<String>,
    permission_request_id: Option<String>,
    creator: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

fn parse_status(s: &str) -> Result<TaskStatus, Error> {
    Ok(match s {
        "pending" => TaskStatus::Pending,
        "running" => TaskStatus::Running,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "retry" => TaskStatus::Retry,
        "cancelled" => TaskStatus::Cancelled,
        other => return Err(Error::permanent(format!("unknown task status: {other}"))),
    })
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Running => "running",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Retry => "retry",
        TaskStatus::Cancelled => "cancelled",
    }
}

fn kind_str(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Workflow => "workflow",
        TaskKind::Verification => "verification",
    }
}

impl TryFrom<TaskRow> for Task {
    type Error = Error;

    fn try_from(row: TaskRow) -> Result<Self, Error> {
        let status = parse_status(&row.status)?;
        let payload: TaskPayload = serde_json::from_value(row.payload)
            .map_err(|e| Error::with_source(ErrorKind::Permanent, "malformed task payload", e))?;
        let result: Option<TaskResult> = row
            .result
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| Error::with_source(ErrorKind::Permanent, "malformed task result", e))?;
        Ok(Task {
            id: TaskId::from_string(row.id),
            name: row.name,
            description: row.description,
            kind: payload.kind(),
            status,
            attempt_count: row.attempt_count.max(0) as u32,
            max_attempts: row.max_attempts.max(0) as u32,
            next_execution_time: row.next_execution_time,
            delay_seconds: row.delay_seconds.max(0) as u64,
            payload,
            result,
            error_message: row.error_message,
            permission_request_id: row.permission_request_id.map(RequestId::from_string),
            creator: row.creator.map(UserId::from_string),
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

pub struct TaskStore {
    db: Db,
}

impl TaskStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn insert(&self, task: &Task) -> Result<(), Error> {
        let payload = serde_json::to_value(&task.payload)
            .map_err(|e| Error::with_source(ErrorKind::Permanent, "failed to serialize task payload", e))?;
        let result = task
            .result
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| Error::with_source(ErrorKind::Permanent, "failed to serialize task result", e))?;
        sqlx::query(
            r#"
            INSERT INTO tasks
                (id, name, description, kind, status, attempt_count, max_attempts,
                 next_execution_time, delay_seconds, payload, result, error_message,
                 permission_request_id, creator, created_at, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(task.id.as_str())
        .bind(&task.name)
        .bind(&task.description)
        .bind(kind_str(task.kind))
        .bind(status_str(task.status))
        .bind(task.attempt_count as i32)
        .bind(task.max_attempts as i32)
        .bind(task.next_execution_time)
        .bind(task.delay_seconds as i64)
        .bind(payload)
        .bind(result)
        .bind(&task.error_message)
        .bind(task.permission_request_id.map(|id| id.to_string()))
        .bind(task.creator.map(|id| id.to_string()))
        .bind(task.created_at)
        .bind(task.started_at)
        .bind(task.completed_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to insert task", e))?;
        Ok(())
    }

    /// All tasks with `status in (pending, retry)` and
    /// `next_execution_time <= now`, ordered by `created_at` ascending,
    /// locked `FOR UPDATE SKIP LOCKED` so concurrent workers don't block
    /// on each other.
    pub async fn ready(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Task>, Error> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"
            SELECT * FROM tasks
            WHERE status IN ('pending', 'retry')
              AND next_execution_time <= $1
            ORDER BY created_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to fetch ready tasks", e))?;
        rows.into_iter().map(Task::try_from).collect()
    }

    /// Verification-kind tasks with `status=pending`,
    /// `next_execution_time IS NULL`, whose payload names a
    /// `depends_on_task_id`.
    pub async fn awaiting_dependency(&self, limit: u32) -> Result<Vec<Task>, Error> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"
            SELECT * FROM tasks
            WHERE kind = 'verification'
              AND status = 'pending'
              AND next_execution_time IS NULL
              AND payload ? 'depends_on_task_id'
              AND payload->>'depends_on_task_id' IS NOT NULL
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to fetch dependency-awaiting tasks", e))?;
        rows.into_iter().map(Task::try_from).collect()
    }

    pub async fn siblings_of(&self, request_id: RequestId) -> Result<Vec<Task>, Error> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE permission_request_id = $1")
            .bind(request_id.as_str())
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to fetch sibling tasks", e))?;
        rows.into_iter().map(Task::try_from).collect()
    }

    pub async fn get(&self, id: TaskId) -> Result<Task, Error> {
        let row: TaskRow = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id.as_str())
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to fetch task", e))?;
        Task::try_from(row)
    }

    pub async fn tasks_depending_on(&self, id: TaskId) -> Result<Vec<Task>, Error> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM tasks WHERE status = 'pending' AND payload->>'depends_on_task_id' = $1",
        )
        .bind(id.as_str())
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to fetch dependent tasks", e))?;
        rows.into_iter().map(Task::try_from).collect()
    }

    pub async fn mark_running(&self, id: TaskId, started_at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            "UPDATE tasks SET status = 'running', started_at = $2, attempt_count = attempt_count + 1 WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(started_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to mark task running", e))?;
        Ok(())
    }

    pub async fn mark_completed(&self, id: TaskId, result: &TaskResult, completed_at: DateTime<Utc>) -> Result<(), Error> {
        let result_json = serde_json::to_value(result)
            .map_err(|e| Error::with_source(ErrorKind::Permanent, "failed to serialize task result", e))?;
        sqlx::query("UPDATE tasks SET status = 'completed', result = $2, completed_at = $3 WHERE id = $1")
            .bind(id.as_str())
            .bind(result_json)
            .bind(completed_at)
            .execute(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to mark task completed", e))?;
        Ok(())
    }

    pub async fn schedule_retry(&self, id: TaskId, next_execution_time: DateTime<Utc>, error_message: &str) -> Result<(), Error> {
        sqlx::query("UPDATE tasks SET status = 'retry', next_execution_time = $2, error_message = $3 WHERE id = $1")
            .bind(id.as_str())
            .bind(next_execution_time)
            .bind(error_message)
            .execute(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to schedule task retry", e))?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: TaskId, error_message: &str) -> Result<(), Error> {
        sqlx::query("UPDATE tasks SET status = 'failed', error_message = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(error_message)
            .execute(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to mark task failed", e))?;
        Ok(())
    }

    pub async fn set_next_execution_time(&self, id: TaskId, next_execution_time: Option<DateTime<Utc>>) -> Result<(), Error> {
        sqlx::query("UPDATE tasks SET next_execution_time = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(next_execution_time)
            .execute(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to update task schedule", e))?;
        Ok(())
    }

    pub async fn cancel(&self, id: TaskId, actor: UserId, reason: &str) -> Result<bool, Error> {
        let result = TaskResult::Cancelled { actor, reason: reason.to_string() };
        let result_json = serde_json::to_value(&result)
            .map_err(|e| Error::with_source(ErrorKind::Permanent, "failed to serialize cancellation", e))?;
        let rows = sqlx::query(
            "UPDATE tasks SET status = 'cancelled', result = $2 WHERE id = $1 AND status IN ('pending', 'retry')",
        )
        .bind(id.as_str())
        .bind(result_json)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to cancel task", e))?;
        Ok(rows.rows_affected() > 0)
    }

    pub async fn cancel_siblings(&self, request_id: RequestId, actor: UserId, reason: &str) -> Result<u64, Error> {
        let result = TaskResult::Cancelled { actor, reason: reason.to_string() };
        let result_json = serde_json::to_value(&result)
            .map_err(|e| Error::with_source(ErrorKind::Permanent, "failed to serialize cancellation", e))?;
        let rows = sqlx::query(
            "UPDATE tasks SET status = 'cancelled', result = $2
             WHERE permission_request_id = $1 AND status IN ('pending', 'retry')
             RETURNING id",
        )
        .bind(request_id.as_str())
        .bind(result_json)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to cancel sibling tasks", e))?;
        Ok(rows.len() as u64)
    }

    /// Deletes tasks in a terminal state older than `cutoff`.
    pub async fn purge(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query(
            "DELETE FROM tasks WHERE status IN ('completed', 'failed', 'cancelled') AND created_at < $1",
        )
        .bind(cutoff)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to purge tasks", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
