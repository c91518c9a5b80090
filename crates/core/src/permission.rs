// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The (folder, group, mode) permission linkage that drives downstream ACL
//! materialisation.

use crate::folder::FolderId;
use crate::group::GroupId;

crate::define_id! {
    /// Identifies a folder-group-permission linkage.
    pub struct PermissionId("fgp-");
}

/// Access mode granted by a permission linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    Read,
    Write,
}

impl PermissionMode {
    /// `idModo` value written to CSV artefacts: 1 for read, 2 for write.
    pub fn mode_id(self) -> u8 {
        match self {
            PermissionMode::Read => 1,
            PermissionMode::Write => 2,
        }
    }

    /// The other mode, used to probe for a `change`-classified request.
    pub fn other(self) -> Self {
        match self {
            PermissionMode::Read => PermissionMode::Write,
            PermissionMode::Write => PermissionMode::Read,
        }
    }
}

crate::simple_display! {
    PermissionMode {
        Read => "read",
        Write => "write",
    }
}

/// The (folder, group, mode) triple, unique on that combination, that a
/// downstream ACL executor materialises.
///
/// `deletion_in_progress` is set between emission of a removal artefact
/// and the verified effect of that removal; `active` is flipped to
/// `false` only after verification confirms the removal.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderGroupPermission {
    pub id: PermissionId,
    pub folder_id: FolderId,
    pub group_id: GroupId,
    pub mode: PermissionMode,
    pub active: bool,
    pub deletion_in_progress: bool,
}

impl FolderGroupPermission {
    pub fn new(folder_id: FolderId, group_id: GroupId, mode: PermissionMode) -> Self {
        Self { id: PermissionId::new(), folder_id, group_id, mode, active: true, deletion_in_progress: false }
    }

    /// Whether this linkage matches the given (folder, mode) pair and is
    /// currently usable to satisfy a new approval.
    pub fn matches(&self, folder_id: FolderId, mode: PermissionMode) -> bool {
        self.active && self.folder_id == folder_id && self.mode == mode
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct FolderGroupPermissionBuilder => FolderGroupPermission {
        set {
            id: PermissionId = PermissionId::new(),
            folder_id: FolderId = FolderId::new(),
            group_id: GroupId = GroupId::new(),
            mode: PermissionMode = PermissionMode::Read,
            active: bool = true,
            deletion_in_progress: bool = false,
        }
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
