// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task entity: one automated step in applying or verifying a permission
//! change.
//!
//! Per the design note on dynamic payloads, `payload`/`result` are tagged
//! variants (one per [`TaskKind`]) rather than an untyped JSON map; the
//! orchestrator never reads an untyped blob out of a row. `arw-storage`
//! serialises these enums to JSON columns at the persistence boundary only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::folder::FolderId;
use crate::group::GroupId;
use crate::permission::PermissionMode;
use crate::request::RequestId;
use crate::user::UserId;

crate::define_id! {
    /// Identifies a task.
    pub struct TaskId("tsk-");
}

/// What a task does once dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Workflow,
    Verification,
}

crate::simple_display! {
    TaskKind {
        Workflow => "workflow",
        Verification => "verification",
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retry,
    Cancelled,
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Retry => "retry",
        Cancelled => "cancelled",
    }
}

/// A stripped copy of [`TaskStatus`] with associated data removed, for
/// wire/query boundaries that only need to filter or display the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatusKind {
    Pending,
    Running,
    Completed,
    Failed,
    Retry,
    Cancelled,
}

impl From<&TaskStatus> for TaskStatusKind {
    fn from(status: &TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => TaskStatusKind::Pending,
            TaskStatus::Running => TaskStatusKind::Running,
            TaskStatus::Completed => TaskStatusKind::Completed,
            TaskStatus::Failed => TaskStatusKind::Failed,
            TaskStatus::Retry => TaskStatusKind::Retry,
            TaskStatus::Cancelled => TaskStatusKind::Cancelled,
        }
    }
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// Whether the task is eligible for the `ready(limit)` sweep.
    pub fn is_schedulable(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Retry)
    }
}

/// The membership change a workflow/verification task is applying or
/// confirming. `Add` succeeds when the principal becomes a member;
/// the three removal variants succeed when the principal is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    Add,
    Remove,
    RemoveAdSync,
    Delete,
}

impl TaskAction {
    /// `idAccion` value written to CSV artefacts: 1 for add, 2 for any removal.
    pub fn action_id(self) -> u8 {
        match self {
            TaskAction::Add => 1,
            TaskAction::Remove | TaskAction::RemoveAdSync | TaskAction::Delete => 2,
        }
    }

    /// Whether a verification task for this action succeeds on membership
    /// (`Add`) or on absence of membership (every removal variant).
    pub fn expects_membership(self) -> bool {
        matches!(self, TaskAction::Add)
    }
}

crate::simple_display! {
    TaskAction {
        Add => "add",
        Remove => "remove",
        RemoveAdSync => "remove_ad_sync",
        Delete => "delete",
    }
}

/// How a task's immediate-vs-queued execution was decided, recorded in
/// the result blob per §4.6's fast-path contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    Immediate,
    Queued,
}

/// Tagged task payload: one variant per [`TaskKind`], carrying everything
/// dispatch needs without an untyped map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    Workflow {
        folder_id: FolderId,
        group_id: GroupId,
        mode: PermissionMode,
        action: TaskAction,
        requester: UserId,
        csv_path: Option<String>,
        depends_on_task_id: Option<TaskId>,
    },
    Verification {
        folder_id: FolderId,
        group_id: GroupId,
        mode: PermissionMode,
        action: TaskAction,
        requester: UserId,
        depends_on_task_id: Option<TaskId>,
    },
}

impl TaskPayload {
    pub fn depends_on_task_id(&self) -> Option<TaskId> {
        match self {
            TaskPayload::Workflow { depends_on_task_id, .. }
            | TaskPayload::Verification { depends_on_task_id, .. } => *depends_on_task_id,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::Workflow { .. } => TaskKind::Workflow,
            TaskPayload::Verification { .. } => TaskKind::Verification,
        }
    }
}

/// Tagged task result: one variant per [`TaskKind`], plus a `Cancelled`
/// variant recorded on advisory cancellation (§5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskResult {
    Workflow {
        run_id: String,
        final_state: Option<String>,
        execution_type: ExecutionType,
    },
    Verification {
        member: bool,
        inconclusive: bool,
        execution_type: ExecutionType,
    },
    Cancelled {
        actor: UserId,
        reason: String,
    },
}

/// One automated step in applying or verifying a permission change.
///
/// Invariant: `attempt_count <= max_attempts`. A verification task with
/// an unresolved `depends_on_task_id` has `next_execution_time = None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: Option<String>,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub next_execution_time: Option<DateTime<Utc>>,
    pub delay_seconds: u64,
    pub payload: TaskPayload,
    pub result: Option<TaskResult>,
    pub error_message: Option<String>,
    pub permission_request_id: Option<RequestId>,
    pub creator: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(name: impl Into<String>, payload: TaskPayload, now: DateTime<Utc>) -> Self {
        let kind = payload.kind();
        Self {
            id: TaskId::new(),
            name: name.into(),
            description: None,
            kind,
            status: TaskStatus::Pending,
            attempt_count: 0,
            max_attempts: 3,
            next_execution_time: Some(now),
            delay_seconds: 0,
            payload,
            result: None,
            error_message: None,
            permission_request_id: None,
            creator: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn depends_on_task_id(&self) -> Option<TaskId> {
        self.payload.depends_on_task_id()
    }

    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_attempts
    }

    /// Whether this task may be cancelled: only while still queued.
    pub fn can_cancel(&self) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::Retry)
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            name: String = "workflow-task",
        }
        set {
            id: TaskId = TaskId::new(),
            kind: TaskKind = TaskKind::Workflow,
            status: TaskStatus = TaskStatus::Pending,
            attempt_count: u32 = 0,
            max_attempts: u32 = 3,
            delay_seconds: u64 = 0,
            payload: TaskPayload = TaskPayload::Workflow {
                folder_id: FolderId::new(),
                group_id: GroupId::new(),
                mode: PermissionMode::Read,
                action: TaskAction::Add,
                requester: UserId::new(),
                csv_path: None,
                depends_on_task_id: None,
            },
            created_at: DateTime<Utc> = Utc::now(),
        }
        option {
            description: String = None,
            next_execution_time: DateTime<Utc> = None,
            result: TaskResult = None,
            error_message: String = None,
            permission_request_id: RequestId = None,
            creator: UserId = None,
            started_at: DateTime<Utc> = None,
            completed_at: DateTime<Utc> = None,
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
