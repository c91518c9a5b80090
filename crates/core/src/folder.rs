// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Folder entity and its owner/validator relations.

use crate::user::UserId;

crate::define_id! {
    /// Identifies a folder under permission control.
    pub struct FolderId("fld-");
}

/// A filesystem folder whose access is mediated through [`crate::FolderGroupPermission`]
/// linkages.
///
/// `owners` and `validators` are both empty-allowed ordered sets of users.
/// An owner is always authorised to validate a request against this
/// folder; `validators` is additive, never a replacement for `owners`.
#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    pub id: FolderId,
    pub path: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub creator: UserId,
    pub owners: Vec<UserId>,
    pub validators: Vec<UserId>,
}

impl Folder {
    pub fn new(path: impl Into<String>, name: impl Into<String>, creator: UserId) -> Self {
        Self {
            id: FolderId::new(),
            path: path.into(),
            name: name.into(),
            description: None,
            active: true,
            creator,
            owners: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// Path as stored; sanitisation for display/audit purposes is
    /// intentionally not performed (open question, see DESIGN.md).
    pub fn sanitized_path(&self) -> &str {
        &self.path
    }

    /// Whether `user` may validate a request against this folder: an
    /// owner always may; an explicit validator also may.
    pub fn may_validate(&self, user: UserId) -> bool {
        self.owners.contains(&user) || self.validators.contains(&user)
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct FolderBuilder => Folder {
        into {
            path: String = "/proj/X",
            name: String = "proj-x",
        }
        set {
            id: FolderId = FolderId::new(),
            active: bool = true,
            creator: UserId = UserId::new(),
            owners: Vec<UserId> = Vec::new(),
            validators: Vec<UserId> = Vec::new(),
        }
        option {
            description: String = None,
        }
    }
}

#[cfg(test)]
#[path = "folder_tests.rs"]
mod tests;
