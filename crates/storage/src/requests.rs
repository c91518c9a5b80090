// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission request store (C2/C7 backing): CRUD plus the lookups the
//! classification algorithm needs before any state change.

use arw_core::request::RequestStatus;
use arw_core::{Error, ErrorKind, FolderId, GroupId, PermissionMode, PermissionRequest, RequestId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::db::{sqlx_err, Db};

#[derive(FromRow)]
struct RequestRow {
    id: String,
    requester: String,
    folder_id: String,
    validator: Option<String>,
    mode: String,
    business_need: String,
    status: String,
    assigned_group: Option<String>,
    decision_comment: Option<String>,
    validated_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn parse_mode(s: &str) -> Result<PermissionMode, Error> {
    Ok(match s {
        "read" => PermissionMode::Read,
        "write" => PermissionMode::Write,
        other => return Err(Error::permanent(format!("unknown permission mode: {other}"))),
    })
}

fn mode_str(mode: PermissionMode) -> &'static str {
    match mode {
        PermissionMode::Read => "read",
        PermissionMode::Write => "write",
    }
}

fn parse_status(s: &str) -> Result<RequestStatus, Error> {
    Ok(match s {
        "pending" => RequestStatus::Pending,
        "approved" => RequestStatus::Approved,
        "rejected" => RequestStatus::Rejected,
        "canceled" => RequestStatus::Canceled,
        "revoked" => RequestStatus::Revoked,
        "failed" => RequestStatus::Failed,
        other => return Err(Error::permanent(format!("unknown request status: {other}"))),
    })
}

fn status_str(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "pending",
        RequestStatus::Approved => "approved",
        RequestStatus::Rejected => "rejected",
        RequestStatus::Canceled => "canceled",
        RequestStatus::Revoked => "revoked",
        RequestStatus::Failed => "failed",
    }
}

impl TryFrom<RequestRow> for PermissionRequest {
    type Error = Error;

    fn try_from(row: RequestRow) -> Result<Self, Error> {
        Ok(PermissionRequest {
            id: RequestId::from_string(row.id),
            requester: UserId::from_string(row.requester),
            folder_id: FolderId::from_string(row.folder_id),
            validator: row.validator.map(UserId::from_string),
            mode: parse_mode(&row.mode)?,
            business_need: row.business_need,
            status: parse_status(&row.status)?,
            assigned_group: row.assigned_group.map(GroupId::from_string),
            decision_comment: row.decision_comment,
            validated_at: row.validated_at,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

pub struct RequestStore {
    db: Db,
}

impl RequestStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn insert(&self, request: &PermissionRequest) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO permission_requests
                (id, requester, folder_id, validator, mode, business_need, status,
                 assigned_group, decision_comment, validated_at, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(request.id.as_str())
        .bind(request.requester.as_str())
        .bind(request.folder_id.as_str())
        .bind(request.validator.map(|id| id.to_string()))
        .bind(mode_str(request.mode))
        .bind(&request.business_need)
        .bind(status_str(request.status))
        .bind(request.assigned_group.map(|id| id.to_string()))
        .bind(&request.decision_comment)
        .bind(request.validated_at)
        .bind(request.expires_at)
        .bind(request.created_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to insert permission request", e))?;
        Ok(())
    }

    pub async fn get(&self, id: RequestId) -> Result<PermissionRequest, Error> {
        let row: RequestRow = sqlx::query_as("SELECT * FROM permission_requests WHERE id = $1")
            .bind(id.as_str())
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to fetch permission request", e))?;
        PermissionRequest::try_from(row)
    }

    /// The approved request, if any, for this exact (requester, folder, mode).
    pub async fn approved_for_triple(
        &self,
        requester: UserId,
        folder_id: FolderId,
        mode: PermissionMode,
    ) -> Result<Option<PermissionRequest>, Error> {
        let row: Option<RequestRow> = sqlx::query_as(
            "SELECT * FROM permission_requests
             WHERE requester = $1 AND folder_id = $2 AND mode = $3 AND status = 'approved'
             LIMIT 1",
        )
        .bind(requester.as_str())
        .bind(folder_id.as_str())
        .bind(mode_str(mode))
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to fetch approved request", e))?;
        row.map(PermissionRequest::try_from).transpose()
    }

    /// Any approved requests for this (requester, folder) at another mode,
    /// used by the classifier to detect a `Change`.
    pub async fn approved_for_folder(
        &self,
        requester: UserId,
        folder_id: FolderId,
    ) -> Result<Vec<PermissionRequest>, Error> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            "SELECT * FROM permission_requests
             WHERE requester = $1 AND folder_id = $2 AND status = 'approved'",
        )
        .bind(requester.as_str())
        .bind(folder_id.as_str())
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to fetch approved requests for folder", e))?;
        rows.into_iter().map(PermissionRequest::try_from).collect()
    }

    /// Any still-pending request for this (requester, folder, mode) triple.
    pub async fn pending_for_triple(
        &self,
        requester: UserId,
        folder_id: FolderId,
        mode: PermissionMode,
    ) -> Result<Option<PermissionRequest>, Error> {
        let row: Option<RequestRow> = sqlx::query_as(
            "SELECT * FROM permission_requests
             WHERE requester = $1 AND folder_id = $2 AND mode = $3 AND status = 'pending'
             LIMIT 1",
        )
        .bind(requester.as_str())
        .bind(folder_id.as_str())
        .bind(mode_str(mode))
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to fetch pending request", e))?;
        row.map(PermissionRequest::try_from).transpose()
    }

    /// The most recently created request for this triple, regardless of
    /// status, used to detect a `Retry` off a `failed`/`rejected` tail.
    pub async fn most_recent_for_triple(
        &self,
        requester: UserId,
        folder_id: FolderId,
        mode: PermissionMode,
    ) -> Result<Option<PermissionRequest>, Error> {
        let row: Option<RequestRow> = sqlx::query_as(
            "SELECT * FROM permission_requests
             WHERE requester = $1 AND folder_id = $2 AND mode = $3
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(requester.as_str())
        .bind(folder_id.as_str())
        .bind(mode_str(mode))
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to fetch most recent request", e))?;
        row.map(PermissionRequest::try_from).transpose()
    }

    pub async fn set_status(
        &self,
        id: RequestId,
        status: RequestStatus,
        decision_comment: Option<&str>,
        validated_at: Option<DateTime<Utc>>,
    ) -> Result<(), Error> {
        sqlx::query(
            "UPDATE permission_requests
             SET status = $2, decision_comment = $3, validated_at = $4
             WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(status_str(status))
        .bind(decision_comment)
        .bind(validated_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to update request status", e))?;
        Ok(())
    }

    pub async fn assign_group(&self, id: RequestId, group_id: GroupId) -> Result<(), Error> {
        sqlx::query("UPDATE permission_requests SET assigned_group = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(group_id.as_str())
            .execute(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to assign group to request", e))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "requests_tests.rs"]
mod tests;
