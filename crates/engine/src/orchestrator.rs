// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task orchestrator (C6): the central tick loop that dispatches queued
//! tasks, resolves chain dependencies, and cascades failure back onto the
//! owning permission request.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use arw_adapters::{Delivery, DirectoryBackend, RunState, WorkflowExecutor};
use arw_core::{
    config::TaskConfig, Error, ErrorKind, ExecutionType, RequestStatus, Task, TaskId, TaskKind,
    TaskPayload, TaskResult, TaskStatus, UserId,
};
use arw_storage::{GroupStore, PermissionStore, RequestStore, TaskStore};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex as AsyncMutex;

use crate::artefact::ArtefactWriter;
use crate::audit::AuditRecorder;
use crate::notifier::Notifier;

const DAG_EXECUTION_FAILED_AFTER_RETRIES: &str = "DAG_EXECUTION_FAILED_AFTER_RETRIES";

pub struct Orchestrator<W: WorkflowExecutor, Dir: DirectoryBackend, D: Delivery> {
    tasks: TaskStore,
    requests: RequestStore,
    permissions: PermissionStore,
    groups: GroupStore,
    artefacts: ArtefactWriter,
    workflow: W,
    directory: Arc<Dir>,
    notifier: Notifier<D>,
    audit: AuditRecorder,
    config: TaskConfig,
    /// Serializes ticks within this process; across processes, `ready`'s
    /// `FOR UPDATE SKIP LOCKED` read does the equivalent job.
    tick_lock: AsyncMutex<()>,
}

impl<W: WorkflowExecutor, Dir: DirectoryBackend, D: Delivery> Orchestrator<W, Dir, D> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: TaskStore,
        requests: RequestStore,
        permissions: PermissionStore,
        groups: GroupStore,
        artefacts: ArtefactWriter,
        workflow: W,
        directory: Arc<Dir>,
        notifier: Notifier<D>,
        audit: AuditRecorder,
        config: TaskConfig,
    ) -> Self {
        Self { tasks, requests, permissions, groups, artefacts, workflow, directory, notifier, audit, config, tick_lock: AsyncMutex::new(()) }
    }

    /// Runs one orchestration pass: resolve dependencies, then dispatch a
    /// batch of ready tasks. A concurrent call on the same process is a
    /// no-op rather than queued behind the lock.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<(), Error> {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            tracing::debug!("orchestrator tick already in progress, skipping");
            return Ok(());
        };
        self.resolve_dependencies(now).await?;
        self.process_ready_batch(now).await?;
        Ok(())
    }

    async fn resolve_dependencies(&self, now: DateTime<Utc>) -> Result<(), Error> {
        let waiting = self.tasks.awaiting_dependency(self.config.batch_size).await?;
        for task in waiting {
            let Some(dep_id) = task.depends_on_task_id() else { continue };
            let dep = match self.tasks.get(dep_id).await {
                Ok(dep) => dep,
                Err(e) if e.kind == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            if dep.status == TaskStatus::Completed {
                self.tasks.set_next_execution_time(task.id, Some(now + Duration::seconds(60))).await?;
            }
        }
        Ok(())
    }

    async fn process_ready_batch(&self, now: DateTime<Utc>) -> Result<(), Error> {
        let ready = self.tasks.ready(now, self.config.batch_size).await?;
        for task in ready {
            self.dispatch_one(task, now).await?;
        }
        Ok(())
    }

    async fn dispatch_one(&self, mut task: Task, now: DateTime<Utc>) -> Result<(), Error> {
        self.tasks.mark_running(task.id, now).await?;
        task.status = TaskStatus::Running;
        task.attempt_count += 1;

        let outcome = match &task.payload {
            TaskPayload::Workflow { .. } => self.dispatch_workflow(&task, now).await,
            TaskPayload::Verification { .. } => self.dispatch_verification(&task, now).await,
        };

        match outcome {
            Ok(result) => {
                self.tasks.mark_completed(task.id, &result, now).await?;
                self.on_task_completed(task.id, now).await?;
            }
            Err(err) if err.is_retryable() && task.can_retry() => {
                let retry_delay = Duration::from_std(self.config.retry_delay).unwrap_or(Duration::seconds(300));
                self.tasks
                    .schedule_retry(task.id, now + retry_delay, &err.message)
                    .await?;
            }
            Err(err) => {
                self.tasks.mark_failed(task.id, &err.message).await?;
                self.on_task_failed(&task, &err, now).await?;
            }
        }
        Ok(())
    }

    async fn dispatch_workflow(&self, task: &Task, now: DateTime<Utc>) -> Result<TaskResult, Error> {
        let TaskPayload::Workflow { folder_id, group_id, mode, action, .. } = &task.payload else {
            return Err(Error::new(ErrorKind::Permanent, "workflow dispatch called on non-workflow task"));
        };
        let conf = serde_json::json!({
            "folder_id": folder_id.to_string(),
            "group_id": group_id.to_string(),
            "mode": mode.to_string(),
            "action": action.to_string(),
        });
        let run_id = self
            .workflow
            .submit_run(task.id.as_str(), conf)
            .await
            .map_err(|e| Error::with_source(ErrorKind::Transient, "failed to submit workflow run", e))?;

        let deadline = now + Duration::from_std(self.config.immediate_airflow_timeout).unwrap_or(Duration::seconds(300));
        let mut state = RunState::Queued;
        loop {
            state = self
                .workflow
                .get_run(&run_id)
                .await
                .map_err(|e| Error::with_source(ErrorKind::Transient, "failed to poll workflow run", e))?;
            if state.is_terminal() || Utc::now() >= deadline {
                break;
            }
            tokio::time::sleep(StdDuration::from_secs(self.config.immediate_airflow_poll_interval.as_secs().max(1))).await;
        }

        match state {
            RunState::Success => Ok(TaskResult::Workflow { run_id, final_state: Some("success".to_string()), execution_type: ExecutionType::Queued }),
            RunState::Failed | RunState::Cancelled | RunState::Skipped => {
                Err(Error::external_failed(format!("workflow run {run_id} ended in {state:?}")))
            }
            _ => {
                // Not terminal within the poll budget: treat as an accepted
                // submission, confirmed later by verification.
                Ok(TaskResult::Workflow { run_id, final_state: None, execution_type: ExecutionType::Queued })
            }
        }
    }

    async fn dispatch_verification(&self, task: &Task, _now: DateTime<Utc>) -> Result<TaskResult, Error> {
        let TaskPayload::Verification { group_id, action, requester, .. } = &task.payload else {
            return Err(Error::new(ErrorKind::Permanent, "verification dispatch called on non-verification task"));
        };
        let group = self.groups.get(*group_id).await?;
        let username = requester.to_string();
        let member_dns = match self.directory.user_groups(&username).await {
            Ok(dns) => dns,
            Err(_) => {
                return Err(Error::transient("directory unreachable during verification"));
            }
        };
        let is_member = member_dns.iter().any(|dn| dn.eq_ignore_ascii_case(&group.directory_dn));
        let success = if action.expects_membership() { is_member } else { !is_member };
        if !success {
            return Err(Error::transient("verification did not observe the expected membership state"));
        }
        Ok(TaskResult::Verification { member: is_member, inconclusive: false, execution_type: ExecutionType::Queued })
    }

    async fn on_task_completed(&self, task_id: TaskId, now: DateTime<Utc>) -> Result<(), Error> {
        let task = self.tasks.get(task_id).await?;
        if let Some(path) = artefact_path_for(&task) {
            let _ = self.artefacts.delete_file(&path).await;
        }
        if task.kind == TaskKind::Verification {
            self.settle_permission_on_verified_removal(&task).await?;
        }
        let siblings = self.tasks.tasks_depending_on(task_id).await?;
        for sibling in siblings {
            if sibling.status != TaskStatus::Pending {
                continue;
            }
            self.tasks.set_next_execution_time(sibling.id, Some(now + Duration::seconds(30))).await?;
            if sibling.kind == TaskKind::Verification {
                if let Ok(result) = self.dispatch_verification(&sibling, now).await {
                    self.tasks.mark_completed(sibling.id, &result, now).await?;
                    Box::pin(self.on_task_completed(sibling.id, now)).await?;
                }
            }
        }
        Ok(())
    }

    /// On a completed removal verification, flips the linkage's `active`
    /// to `false` and clears `deletion_in_progress`; a successful `Add`
    /// verification leaves linkages untouched.
    async fn settle_permission_on_verified_removal(&self, task: &Task) -> Result<(), Error> {
        let TaskPayload::Verification { folder_id, group_id, mode, action, .. } = &task.payload else { return Ok(()) };
        if action.expects_membership() {
            return Ok(());
        }
        if let Some(permission) = self.permissions.get_by_triple(*folder_id, *group_id, *mode).await? {
            self.permissions.mark_inactive(permission.id).await?;
        }
        Ok(())
    }

    /// A removal verification that permanently fails leaves the linkage
    /// granted: `deletion_in_progress` clears, `active` is left untouched.
    async fn restore_permission_on_permanent_removal_failure(&self, task: &Task) -> Result<(), Error> {
        let TaskPayload::Verification { folder_id, group_id, mode, action, .. } = &task.payload else { return Ok(()) };
        if action.expects_membership() {
            return Ok(());
        }
        if let Some(permission) = self.permissions.get_by_triple(*folder_id, *group_id, *mode).await? {
            self.permissions.set_deletion_in_progress(permission.id, false).await?;
        }
        Ok(())
    }

    async fn on_task_failed(&self, task: &Task, err: &Error, now: DateTime<Utc>) -> Result<(), Error> {
        if task.kind == TaskKind::Verification {
            self.restore_permission_on_permanent_removal_failure(task).await?;
        }
        self.cancel_dependents(task.id).await?;
        let Some(request_id) = task.permission_request_id else { return Ok(()) };
        let siblings = self.tasks.siblings_of(request_id).await?;
        let all_settled = siblings.iter().all(|t| matches!(t.status, TaskStatus::Failed | TaskStatus::Cancelled));
        if !all_settled {
            return Ok(());
        }
        let request = self.requests.get(request_id).await?;
        if request.status == RequestStatus::Approved {
            self.requests
                .set_status(request_id, RequestStatus::Failed, Some(&crate::state_machine::cascade_failure_comment()), Some(now))
                .await?;
            self.audit
                .record(
                    None,
                    "permission_request",
                    "cascade_fail",
                    "permission_request",
                    request_id.as_str(),
                    "request failed after every task in its chain reached a terminal failure",
                    serde_json::json!({"task_id": task.id.to_string()}),
                    now,
                )
                .await?;
        }
        if err.kind == ErrorKind::ExternalFailed {
            self.notifier
                .notify_error(DAG_EXECUTION_FAILED_AFTER_RETRIES, "workflow-executor", &err.message, now)
                .await?;
        }
        Ok(())
    }

    /// Cancels every task still waiting on `task_id`, then recurses onto
    /// their own dependents: a terminal failure anywhere in a chain must
    /// unwind everything still downstream of it, not just the immediate
    /// successor.
    async fn cancel_dependents(&self, task_id: TaskId) -> Result<(), Error> {
        let dependents = self.tasks.tasks_depending_on(task_id).await?;
        for dependent in dependents {
            if let Some(path) = artefact_path_for(&dependent) {
                let _ = self.artefacts.delete_file(&path).await;
            }
            self.tasks
                .cancel(dependent.id, system_actor(), "automatically cancelled: a prerequisite task failed")
                .await?;
            Box::pin(self.cancel_dependents(dependent.id)).await?;
        }
        Ok(())
    }

    /// Cancels a task while it is still pending/retry; deletes its CSV
    /// artefact if it wrote one.
    pub async fn cancel(&self, task_id: TaskId, actor: UserId, reason: &str) -> Result<(), Error> {
        let task = self.tasks.get(task_id).await?;
        if !task.can_cancel() {
            return Err(Error::conflict("task is not pending or retry"));
        }
        if let Some(path) = artefact_path_for(&task) {
            let _ = self.artefacts.delete_file(&path).await;
        }
        self.tasks.cancel(task_id, actor, reason).await?;
        Ok(())
    }

    /// Cancels every still-cancellable sibling of a request's task chain.
    pub async fn cancel_siblings(&self, request_id: arw_core::RequestId, actor: UserId, reason: &str) -> Result<u64, Error> {
        self.tasks.cancel_siblings(request_id, actor, reason).await
    }

    pub async fn purge(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        self.tasks.purge(cutoff).await
    }
}

fn artefact_path_for(task: &Task) -> Option<String> {
    match &task.payload {
        TaskPayload::Workflow { csv_path, .. } => csv_path.clone(),
        TaskPayload::Verification { .. } => None,
    }
}

/// Actor attributed to cancellations the orchestrator itself initiates,
/// as opposed to ones requested by a human operator through the CLI.
fn system_actor() -> UserId {
    UserId::from_string("user-system")
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
