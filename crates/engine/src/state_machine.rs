// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request state machine (C7): classification and the task plans an
//! approval or revocation installs, expressed as pure functions of
//! already-fetched state. Nothing here touches storage directly; the
//! administrative CLI fetches the inputs, calls these, and persists the
//! result.

use arw_core::{
    Classification, DuplicateSource, Error, ErrorKind, FolderGroupPermission, FolderId, GroupId, PermissionMode,
    PermissionRequest, RequestId, RequestStatus, Task, TaskAction, TaskId, TaskPayload, UserId,
};
use chrono::{DateTime, Utc};

/// Everything [`classify`] needs, already resolved by the caller against
/// the catalogue and request stores for one (requester, folder, mode)
/// triple.
#[derive(Debug, Clone, Default)]
pub struct ClassificationInputs {
    pub approved_same_mode: Option<GroupId>,
    pub membership_same_mode: Option<GroupId>,
    pub approved_other_mode: Option<RequestId>,
    pub pending_other_mode: Option<RequestId>,
    pub membership_other_mode: bool,
    pub most_recent_terminal_failed_or_rejected: Option<RequestId>,
}

/// Classifies a (requester, folder, mode) triple before any state change.
/// Duplicate beats change, which beats retry, which beats a fresh request.
pub fn classify(inputs: &ClassificationInputs) -> Classification {
    if let Some(group) = inputs.membership_same_mode {
        return Classification::Duplicate { source: DuplicateSource::DirectoryMembership, group };
    }
    if let Some(group) = inputs.approved_same_mode {
        return Classification::Duplicate { source: DuplicateSource::ApprovedRequest, group };
    }
    if inputs.membership_other_mode {
        return Classification::Change { existing_request: None, source: DuplicateSource::DirectoryMembership };
    }
    if let Some(id) = inputs.approved_other_mode {
        return Classification::Change { existing_request: Some(id), source: DuplicateSource::ApprovedRequest };
    }
    if let Some(id) = inputs.pending_other_mode {
        return Classification::Change { existing_request: Some(id), source: DuplicateSource::PendingRequest };
    }
    if let Some(id) = inputs.most_recent_terminal_failed_or_rejected {
        return Classification::Retry { previous_request: id };
    }
    Classification::New
}

/// A workflow+verification task chain plus the group the request is
/// ultimately bound to, produced by an approval before anything is
/// persisted.
#[derive(Debug, Clone)]
pub struct ApprovalPlan {
    pub assigned_group: GroupId,
    pub tasks: Vec<Task>,
}

/// Builds the two-task chain (workflow, then a dependent verification) for
/// a brand-new approval. Fails if no active linkage grants (folder, mode).
pub fn plan_new_approval(
    request: &PermissionRequest,
    matching_permission: Option<&FolderGroupPermission>,
    now: DateTime<Utc>,
) -> Result<ApprovalPlan, Error> {
    let permission = matching_permission
        .ok_or_else(|| Error::new(ErrorKind::Conflict, "no active permission linkage grants this folder and mode"))?;

    let workflow = new_chain_task(
        "apply-permission-add",
        request.folder_id,
        permission.group_id,
        request.mode,
        TaskAction::Add,
        request.requester,
        request.id,
        None,
        Some(now),
        now,
    );
    let verification = new_chain_task(
        "verify-permission-add",
        request.folder_id,
        permission.group_id,
        request.mode,
        TaskAction::Add,
        request.requester,
        request.id,
        Some(workflow.id),
        None,
        now,
    );
    Ok(ApprovalPlan { assigned_group: permission.group_id, tasks: vec![workflow, verification] })
}

/// Builds the three-task chain for an approval that changes an existing
/// grant's mode: remove the old linkage, add the new one (depends on the
/// removal), then verify (depends on the add).
pub fn plan_change_approval(
    request: &PermissionRequest,
    old_group_id: GroupId,
    old_mode: PermissionMode,
    matching_permission: Option<&FolderGroupPermission>,
    now: DateTime<Utc>,
) -> Result<ApprovalPlan, Error> {
    let permission = matching_permission
        .ok_or_else(|| Error::new(ErrorKind::Conflict, "no active permission linkage grants this folder and mode"))?;

    let remove_old = new_chain_task(
        "apply-permission-remove-old",
        request.folder_id,
        old_group_id,
        old_mode,
        TaskAction::Remove,
        request.requester,
        request.id,
        None,
        Some(now),
        now,
    );
    let add_new = new_chain_task(
        "apply-permission-add-new",
        request.folder_id,
        permission.group_id,
        request.mode,
        TaskAction::Add,
        request.requester,
        request.id,
        Some(remove_old.id),
        None,
        now,
    );
    let verification = new_chain_task(
        "verify-permission-add-new",
        request.folder_id,
        permission.group_id,
        request.mode,
        TaskAction::Add,
        request.requester,
        request.id,
        Some(add_new.id),
        None,
        now,
    );
    Ok(ApprovalPlan { assigned_group: permission.group_id, tasks: vec![remove_old, add_new, verification] })
}

/// Builds the workflow+verification chain for a revocation of an approved
/// request. `action` distinguishes a group-scoped removal (the linkage
/// itself loses `active`) from a user-scoped one (only the membership is
/// flipped); the caller decides which applies and records `deletion_in_progress`.
pub fn plan_revocation(
    request: &PermissionRequest,
    group_id: GroupId,
    action: TaskAction,
    now: DateTime<Utc>,
) -> ApprovalPlan {
    let workflow = new_chain_task(
        "apply-permission-revoke",
        request.folder_id,
        group_id,
        request.mode,
        action,
        request.requester,
        request.id,
        None,
        Some(now),
        now,
    );
    let verification = new_chain_task(
        "verify-permission-revoke",
        request.folder_id,
        group_id,
        request.mode,
        action,
        request.requester,
        request.id,
        Some(workflow.id),
        None,
        now,
    );
    ApprovalPlan { assigned_group: group_id, tasks: vec![workflow, verification] }
}

#[allow(clippy::too_many_arguments)]
fn new_chain_task(
    name: &str,
    folder_id: FolderId,
    group_id: GroupId,
    mode: PermissionMode,
    action: TaskAction,
    requester: UserId,
    request_id: RequestId,
    depends_on_task_id: Option<TaskId>,
    next_execution_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Task {
    let kind_is_verification = name.starts_with("verify");
    let payload = if kind_is_verification {
        TaskPayload::Verification { folder_id, group_id, mode, action, requester, depends_on_task_id }
    } else {
        TaskPayload::Workflow { folder_id, group_id, mode, action, requester, csv_path: None, depends_on_task_id }
    };
    let mut task = Task::new(name, payload, now);
    task.permission_request_id = Some(request_id);
    task.creator = Some(requester);
    task.next_execution_time = next_execution_time;
    task
}

/// Moves a pending request to `rejected`.
pub fn reject(mut request: PermissionRequest, comment: impl Into<String>, actor: UserId, now: DateTime<Utc>) -> PermissionRequest {
    request.status = RequestStatus::Rejected;
    request.decision_comment = Some(comment.into());
    request.validator = Some(actor);
    request.validated_at = Some(now);
    request
}

/// Cancels a still-pending request, requester- or admin-initiated.
pub fn cancel(mut request: PermissionRequest, comment: impl Into<String>, now: DateTime<Utc>) -> PermissionRequest {
    request.status = RequestStatus::Canceled;
    request.decision_comment = Some(comment.into());
    request.validated_at = Some(now);
    request
}

/// Synthesizes the comment recorded on a pending sibling cancelled because
/// a change-mode approval superseded it.
pub fn superseded_comment(new_request_id: RequestId) -> String {
    format!("automatically cancelled: superseded by approval of {new_request_id}")
}

/// Synthesizes the comment recorded when every task in a request's chain
/// has reached a terminal failure state.
pub fn cascade_failure_comment() -> String {
    "automatically failed: every task in the approval chain failed or was cancelled".to_string()
}

#[cfg(test)]
#[path = "state_machine_tests.rs"]
mod tests;
