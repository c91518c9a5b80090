// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn mode_id_matches_csv_codes() {
    assert_eq!(PermissionMode::Read.mode_id(), 1);
    assert_eq!(PermissionMode::Write.mode_id(), 2);
}

#[test]
fn other_flips_between_read_and_write() {
    assert_eq!(PermissionMode::Read.other(), PermissionMode::Write);
    assert_eq!(PermissionMode::Write.other(), PermissionMode::Read);
}

#[test]
fn matches_requires_active_folder_and_mode() {
    let folder_id = FolderId::new();
    let perm = FolderGroupPermission::builder().folder_id(folder_id).mode(PermissionMode::Read).build();
    assert!(perm.matches(folder_id, PermissionMode::Read));
    assert!(!perm.matches(folder_id, PermissionMode::Write));
    assert!(!perm.matches(FolderId::new(), PermissionMode::Read));
}

#[test]
fn inactive_permission_never_matches() {
    let folder_id = FolderId::new();
    let perm =
        FolderGroupPermission::builder().folder_id(folder_id).mode(PermissionMode::Read).active(false).build();
    assert!(!perm.matches(folder_id, PermissionMode::Read));
}
