// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artefact writer (C1): the CSV files the downstream ACL executor reads
//! to apply or remove a filesystem permission.
//!
//! Format is fixed: UTF-8 without a BOM, `;` delimiter, header row,
//! LF line endings, fields in exactly the order
//! `UserName;ADGroup;idTarea;idAccion;MatriculaUsu;idRecurso;idModo`.

use std::path::{Path, PathBuf};

use arw_core::{Error, Folder, Group, PermissionMode, RequestId, Task, TaskAction, User};
use chrono::{DateTime, Utc};

const HEADER: &str = "UserName;ADGroup;idTarea;idAccion;MatriculaUsu;idRecurso;idModo";

fn hex_nonce() -> String {
    const ALPHABET: [char; 16] =
        ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f'];
    nanoid::nanoid!(8, &ALPHABET)
}

/// One data row of a CSV artefact.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtefactRow {
    pub user_name: String,
    pub ad_group: String,
    pub id_tarea: String,
    pub id_accion: u8,
    pub matricula_usu: String,
    pub id_recurso: String,
    pub id_modo: u8,
}

impl ArtefactRow {
    pub fn for_request(request_id: RequestId, requester: &User, group: &Group, folder: &Folder, action: TaskAction, mode: PermissionMode, domain_prefix: Option<&str>) -> Self {
        Self {
            user_name: requester.bare_username().to_string(),
            ad_group: group.csv_name(domain_prefix),
            id_tarea: request_id.to_string(),
            id_accion: action.action_id(),
            matricula_usu: requester.matricula(),
            id_recurso: folder.id.to_string(),
            id_modo: mode.mode_id(),
        }
    }

    fn to_line(&self) -> String {
        format!(
            "{};{};{};{};{};{};{}",
            self.user_name, self.ad_group, self.id_tarea, self.id_accion, self.matricula_usu, self.id_recurso, self.id_modo
        )
    }
}

fn purpose_for(action: TaskAction) -> &'static str {
    match action {
        TaskAction::Add => "single",
        TaskAction::Remove | TaskAction::Delete => "removePermission",
        TaskAction::RemoveAdSync => "removeADSyncPermission",
    }
}

/// Writes and cleans up CSV artefacts under a configured output directory.
pub struct ArtefactWriter {
    output_dir: PathBuf,
    domain_prefix: Option<String>,
}

impl ArtefactWriter {
    pub fn new(output_dir: impl Into<PathBuf>, domain_prefix: Option<String>) -> Self {
        Self { output_dir: output_dir.into(), domain_prefix }
    }

    pub fn domain_prefix(&self) -> Option<&str> {
        self.domain_prefix.as_deref()
    }

    fn filename(&self, purpose: &str, now: DateTime<Utc>) -> PathBuf {
        let stamp = now.format("%Y%m%dT%H%M%SZ");
        self.output_dir.join(format!("{purpose}_{stamp}_{}.csv", hex_nonce()))
    }

    async fn write_rows(&self, purpose: &str, rows: &[ArtefactRow], now: DateTime<Utc>) -> Result<PathBuf, Error> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| Error::with_source(arw_core::ErrorKind::Transient, "failed to create CSV output directory", e))?;
        let mut body = String::from(HEADER);
        body.push('\n');
        for row in rows {
            body.push_str(&row.to_line());
            body.push('\n');
        }
        let path = self.filename(purpose, now);
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| Error::with_source(arw_core::ErrorKind::Transient, "failed to write CSV artefact", e))?;
        Ok(path)
    }

    /// Writes a single-row artefact for one task's membership change. The
    /// filename purpose distinguishes a grant from an ordinary removal from
    /// an AD-sync-triggered removal, so a downstream consumer can tell them
    /// apart without parsing `idAccion`.
    pub async fn write_single(
        &self,
        request_id: RequestId,
        requester: &User,
        group: &Group,
        folder: &Folder,
        action: TaskAction,
        mode: PermissionMode,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, Error> {
        let row = ArtefactRow::for_request(request_id, requester, group, folder, action, mode, self.domain_prefix.as_deref());
        self.write_rows(purpose_for(action), &[row], now).await
    }

    /// Writes a multi-row artefact covering several tasks in one file.
    pub async fn write_bulk(&self, rows: &[ArtefactRow], now: DateTime<Utc>) -> Result<PathBuf, Error> {
        self.write_rows("bulkMembershipChanges", rows, now).await
    }

    /// Writes an admin-initiated removal not tied to any [`PermissionRequest`](arw_core::PermissionRequest):
    /// `idTarea` becomes `REMOVE_<folderId>_<userId>_<nonce>`.
    pub async fn write_admin_removal(
        &self,
        user: &User,
        folder: &Folder,
        group: &Group,
        mode: PermissionMode,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, Error> {
        let id_tarea = format!("REMOVE_{}_{}_{}", folder.id, user.id, hex_nonce());
        let row = ArtefactRow {
            user_name: user.bare_username().to_string(),
            ad_group: group.csv_name(self.domain_prefix.as_deref()),
            id_tarea,
            id_accion: TaskAction::Remove.action_id(),
            matricula_usu: user.matricula(),
            id_recurso: folder.id.to_string(),
            id_modo: mode.mode_id(),
        };
        self.write_rows("admin_removal", &[row], now).await
    }

    /// Deletes a single artefact by path, ignoring a missing file: the
    /// orchestrator calls this once a task's artefact is no longer needed
    /// (cancellation, or its owning verification reaching a terminal state).
    pub async fn delete_file(&self, path: &str) -> Result<(), Error> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::with_source(arw_core::ErrorKind::Transient, "failed to delete CSV artefact", e)),
        }
    }

    /// Backstop sweep for files older than `cutoff`, keyed off filesystem
    /// modification time. The primary cleanup path is state-driven (see
    /// [`Self::delete_file`]); this only catches artefacts orphaned by a
    /// crash between write and the owning task reaching a terminal state.
    pub async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let mut read_dir = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::with_source(arw_core::ErrorKind::Transient, "failed to scan CSV output directory", e)),
        };
        let mut removed = 0u64;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| Error::with_source(arw_core::ErrorKind::Transient, "failed to read CSV output directory entry", e))?
        {
            if !is_stale(&entry.path(), cutoff).await {
                continue;
            }
            if tokio::fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

async fn is_stale(path: &Path, cutoff: DateTime<Utc>) -> bool {
    let Ok(metadata) = tokio::fs::metadata(path).await else {
        return false;
    };
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    DateTime::<Utc>::from(modified) < cutoff
}

#[cfg(test)]
#[path = "artefact_tests.rs"]
mod tests;
