// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Folder-group-permission linkage store (C2 backing).

use arw_core::{Error, FolderGroupPermission, FolderId, GroupId, PermissionId, PermissionMode};
use sqlx::FromRow;

use crate::db::{sqlx_err, Db};

#[derive(FromRow)]
struct PermissionRow {
    id: String,
    folder_id: String,
    group_id: String,
    mode: String,
    active: bool,
    deletion_in_progress: bool,
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

impl TryFrom<PermissionRow> for FolderGroupPermission {
    type Error = Error;

    fn try_from(row: PermissionRow) -> Result<Self, Error> {
        Ok(FolderGroupPermission {
            id: PermissionId::from_string(row.id),
            folder_id: FolderId::from_string(row.folder_id),
            group_id: GroupId::from_string(row.group_id),
            mode: parse_mode(&row.mode)?,
            active: row.active,
            deletion_in_progress: row.deletion_in_progress,
        })
    }
}

pub struct PermissionStore {
    db: Db,
}

impl PermissionStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn upsert(&self, permission: &FolderGroupPermission) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO folder_group_permissions (id, folder_id, group_id, mode, active, deletion_in_progress)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (folder_id, group_id, mode) DO UPDATE SET
                active = EXCLUDED.active,
                deletion_in_progress = EXCLUDED.deletion_in_progress
            "#,
        )
        .bind(permission.id.as_str())
        .bind(permission.folder_id.as_str())
        .bind(permission.group_id.as_str())
        .bind(mode_str(permission.mode))
        .bind(permission.active)
        .bind(permission.deletion_in_progress)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to upsert folder-group permission", e))?;
        Ok(())
    }

    /// The active linkage, if any, already granting `(folder_id, mode)`.
    /// This is the group an approval should bind the requester into.
    pub async fn first_matching(
        &self,
        folder_id: FolderId,
        mode: PermissionMode,
    ) -> Result<Option<FolderGroupPermission>, Error> {
        let row: Option<PermissionRow> = sqlx::query_as(
            "SELECT id, folder_id, group_id, mode, active, deletion_in_progress FROM folder_group_permissions
             WHERE folder_id = $1 AND mode = $2 AND active = TRUE AND deletion_in_progress = FALSE
             ORDER BY seq ASC
             LIMIT 1",
        )
        .bind(folder_id.as_str())
        .bind(mode_str(mode))
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to look up matching permission", e))?;
        row.map(FolderGroupPermission::try_from).transpose()
    }

    /// The exact linkage for `(folder_id, group_id, mode)`, regardless of
    /// `active`/`deletion_in_progress`. Used to resolve a revocation back
    /// to the row it should flip once verified.
    pub async fn get_by_triple(
        &self,
        folder_id: FolderId,
        group_id: GroupId,
        mode: PermissionMode,
    ) -> Result<Option<FolderGroupPermission>, Error> {
        let row: Option<PermissionRow> = sqlx::query_as(
            "SELECT id, folder_id, group_id, mode, active, deletion_in_progress FROM folder_group_permissions
             WHERE folder_id = $1 AND group_id = $2 AND mode = $3",
        )
        .bind(folder_id.as_str())
        .bind(group_id.as_str())
        .bind(mode_str(mode))
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to look up permission by triple", e))?;
        row.map(FolderGroupPermission::try_from).transpose()
    }

    pub async fn set_deletion_in_progress(&self, id: PermissionId, in_progress: bool) -> Result<(), Error> {
        sqlx::query("UPDATE folder_group_permissions SET deletion_in_progress = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(in_progress)
            .execute(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to update deletion_in_progress", e))?;
        Ok(())
    }

    pub async fn mark_inactive(&self, id: PermissionId) -> Result<(), Error> {
        sqlx::query("UPDATE folder_group_permissions SET active = FALSE, deletion_in_progress = FALSE WHERE id = $1")
            .bind(id.as_str())
            .execute(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to mark permission inactive", e))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "permissions_tests.rs"]
mod tests;
