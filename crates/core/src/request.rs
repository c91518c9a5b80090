// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission request entity and the classification result produced by
//! the request state machine before any state change.

use chrono::{DateTime, Utc};

use crate::folder::FolderId;
use crate::group::GroupId;
use crate::permission::PermissionMode;
use crate::user::UserId;

crate::define_id! {
    /// Identifies a permission request.
    pub struct RequestId("req-");
}

/// Lifecycle state of a permission request. Transitions are one-way
/// except `Approved -> Revoked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Canceled,
    Revoked,
    Failed,
}

crate::simple_display! {
    RequestStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Canceled => "canceled",
        Revoked => "revoked",
        Failed => "failed",
    }
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Canceled | RequestStatus::Failed)
    }
}

/// A user's ask for a specific permission on a specific folder.
///
/// Invariant: a `pending` request with the same (requester, folder, mode)
/// must not coexist with an `approved` one for the same triple.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionRequest {
    pub id: RequestId,
    pub requester: UserId,
    pub folder_id: FolderId,
    pub validator: Option<UserId>,
    pub mode: PermissionMode,
    pub business_need: String,
    pub status: RequestStatus,
    pub assigned_group: Option<GroupId>,
    pub decision_comment: Option<String>,
    pub validated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PermissionRequest {
    pub fn new(
        requester: UserId,
        folder_id: FolderId,
        mode: PermissionMode,
        business_need: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            requester,
            folder_id,
            validator: None,
            mode,
            business_need: business_need.into(),
            status: RequestStatus::Pending,
            assigned_group: None,
            decision_comment: None,
            validated_at: None,
            expires_at: None,
            created_at: now,
        }
    }

    /// Who may validate this request: an admin; an owner of the folder; an
    /// explicit validator of the folder; or, if a specific validator was
    /// named at creation, only that validator or an admin.
    pub fn may_be_validated_by(&self, candidate: UserId, is_admin: bool, folder: &crate::folder::Folder) -> bool {
        if is_admin {
            return true;
        }
        match self.validator {
            Some(named) => candidate == named,
            None => folder.may_validate(candidate),
        }
    }
}

/// Which authoritative source produced a `duplicate`/`change` classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateSource {
    ApprovedRequest,
    DirectoryMembership,
    PendingRequest,
}

/// Result of classifying a (requester, folder, mode) triple before any
/// state change, per §4.7.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// An approved request or active directory membership already grants
    /// this exact (folder, mode).
    Duplicate { source: DuplicateSource, group: GroupId },
    /// An approved/pending request or membership grants this folder at a
    /// different mode.
    Change { existing_request: Option<RequestId>, source: DuplicateSource },
    /// The most recent request for this triple ended in `failed` or `rejected`.
    Retry { previous_request: RequestId },
    /// None of the above; a fresh request.
    New,
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct PermissionRequestBuilder => PermissionRequest {
        into {
            business_need: String = "need access for project work",
        }
        set {
            id: RequestId = RequestId::new(),
            requester: UserId = UserId::new(),
            folder_id: FolderId = FolderId::new(),
            mode: PermissionMode = PermissionMode::Read,
            status: RequestStatus = RequestStatus::Pending,
            created_at: DateTime<Utc> = Utc::now(),
        }
        option {
            validator: UserId = None,
            assigned_group: GroupId = None,
            decision_comment: String = None,
            validated_at: DateTime<Utc> = None,
            expires_at: DateTime<Utc> = None,
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
