// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arw_core::{FolderGroupPermission, User};

async fn seed_folder_and_group(pool: &sqlx::PgPool) -> (FolderId, GroupId) {
    let user = User::builder().build();
    sqlx::query("INSERT INTO users (id, username, email, display_name) VALUES ($1, $2, $3, $4)")
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .execute(pool)
        .await
        .expect("seed user");

    let folder_id = FolderId::new();
    sqlx::query("INSERT INTO folders (id, path, name, creator) VALUES ($1, $2, $3, $4)")
        .bind(folder_id.as_str())
        .bind(format!("/share/{}", folder_id.suffix()))
        .bind("Test Folder")
        .bind(user.id.as_str())
        .execute(pool)
        .await
        .expect("seed folder");

    let group_id = GroupId::new();
    sqlx::query("INSERT INTO groups (id, name, directory_dn) VALUES ($1, $2, $3)")
        .bind(group_id.as_str())
        .bind(format!("grp-{}", group_id.suffix()))
        .bind(format!("CN=grp-{},DC=example,DC=com", group_id.suffix()))
        .execute(pool)
        .await
        .expect("seed group");

    (folder_id, group_id)
}

#[sqlx::test(migrations = "./migrations")]
async fn first_matching_returns_oldest_active_linkage(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let (folder_id, group_id) = seed_folder_and_group(&pool).await;
    let store = PermissionStore::new(Db::from_pool(pool));

    let first = FolderGroupPermission::new(folder_id, group_id, PermissionMode::Read);
    store.upsert(&first).await.expect("insert first");

    let found = store
        .first_matching(folder_id, PermissionMode::Read)
        .await
        .expect("query")
        .expect("match found");
    assert_eq!(found.id, first.id);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn first_matching_excludes_deletion_in_progress(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let (folder_id, group_id) = seed_folder_and_group(&pool).await;
    let store = PermissionStore::new(Db::from_pool(pool));

    let mut permission = FolderGroupPermission::new(folder_id, group_id, PermissionMode::Write);
    permission.deletion_in_progress = true;
    store.upsert(&permission).await.expect("insert");

    assert!(store.first_matching(folder_id, PermissionMode::Write).await.expect("query").is_none());
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn get_by_triple_finds_exact_linkage_even_when_inactive(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let (folder_id, group_id) = seed_folder_and_group(&pool).await;
    let store = PermissionStore::new(Db::from_pool(pool));

    let mut permission = FolderGroupPermission::new(folder_id, group_id, PermissionMode::Read);
    permission.active = false;
    store.upsert(&permission).await.expect("insert");

    let found = store.get_by_triple(folder_id, group_id, PermissionMode::Read).await.expect("query").expect("found");
    assert_eq!(found.id, permission.id);
    assert!(!found.active);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn mark_inactive_clears_deletion_in_progress(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let (folder_id, group_id) = seed_folder_and_group(&pool).await;
    let store = PermissionStore::new(Db::from_pool(pool));

    let mut permission = FolderGroupPermission::new(folder_id, group_id, PermissionMode::Read);
    permission.deletion_in_progress = true;
    store.upsert(&permission).await.expect("insert");

    store.mark_inactive(permission.id).await.expect("mark_inactive");
    assert!(store.first_matching(folder_id, PermissionMode::Read).await.expect("query").is_none());
    Ok(())
}
