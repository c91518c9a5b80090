// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use arw_adapters::FakeDirectoryBackend;
use arw_core::{Folder, FolderGroupPermission, Group, PermissionMode, PermissionRequest, RequestStatus, Task, TaskKind, TaskPayload, TaskStatus, User};
use arw_storage::{Db, FolderStore, UserStore};
use chrono::Utc;

use super::*;

async fn seed_user(pool: &sqlx::PgPool) -> User {
    let user = User::builder().build();
    sqlx::query("INSERT INTO users (id, username, email, display_name) VALUES ($1, $2, $3, $4)")
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .execute(pool)
        .await
        .expect("seed user");
    user
}

async fn seed_folder(pool: &sqlx::PgPool, creator: &User) -> Folder {
    let folder = Folder::builder().creator(creator.id).build();
    sqlx::query("INSERT INTO folders (id, path, name, creator) VALUES ($1, $2, $3, $4)")
        .bind(folder.id.as_str())
        .bind(&folder.path)
        .bind(&folder.name)
        .bind(creator.id.as_str())
        .execute(pool)
        .await
        .expect("seed folder");
    folder
}

async fn seed_group(pool: &sqlx::PgPool) -> Group {
    let group = Group::builder().build();
    sqlx::query("INSERT INTO groups (id, name, directory_dn) VALUES ($1, $2, $3)")
        .bind(group.id.as_str())
        .bind(&group.name)
        .bind(&group.directory_dn)
        .execute(pool)
        .await
        .expect("seed group");
    group
}

async fn seed_request(pool: &sqlx::PgPool, requester: &User, folder: &Folder, mode: PermissionMode, status: RequestStatus) -> PermissionRequest {
    let request = PermissionRequest::builder().requester(requester.id).folder_id(folder.id).mode(mode).status(status).build();
    sqlx::query(
        "INSERT INTO permission_requests (id, requester, folder_id, mode, business_need, status, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(request.id.as_str())
    .bind(request.requester.as_str())
    .bind(request.folder_id.as_str())
    .bind(if mode == PermissionMode::Read { "read" } else { "write" })
    .bind(&request.business_need)
    .bind(match status {
        RequestStatus::Pending => "pending",
        RequestStatus::Approved => "approved",
        _ => "pending",
    })
    .bind(request.created_at)
    .execute(pool)
    .await
    .expect("seed request");
    request
}

async fn seed_permission(pool: &sqlx::PgPool, permission: &FolderGroupPermission) {
    sqlx::query(
        "INSERT INTO folder_group_permissions (id, folder_id, group_id, mode, active, deletion_in_progress)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(permission.id.as_str())
    .bind(permission.folder_id.as_str())
    .bind(permission.group_id.as_str())
    .bind(if permission.mode == PermissionMode::Read { "read" } else { "write" })
    .bind(permission.active)
    .bind(permission.deletion_in_progress)
    .execute(pool)
    .await
    .expect("seed permission");
}

fn test_artefacts() -> (tempfile::TempDir, ArtefactWriter) {
    let dir = tempfile::tempdir().expect("tempdir");
    let writer = ArtefactWriter::new(dir.path(), None);
    (dir, writer)
}

fn csv_path_of(task: &Task) -> Option<String> {
    match &task.payload {
        TaskPayload::Workflow { csv_path, .. } => csv_path.clone(),
        TaskPayload::Verification { .. } => None,
    }
}

#[allow(clippy::too_many_arguments)]
async fn call_approve(
    requests: &RequestStore,
    permissions: &PermissionStore,
    tasks: &TaskStore,
    users: &UserStore,
    groups: &GroupStore,
    folders: &FolderStore,
    artefacts: &ArtefactWriter,
    directory: &FakeDirectoryBackend,
    request_id: &str,
) -> Result<()> {
    let actor = UserId::from_string("user-cli-admin");
    approve(requests, permissions, tasks, users, groups, folders, artefacts, directory, actor, request_id).await
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn approve_binds_group_and_queues_chain(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let db = Db::from_pool(pool.clone());
    let requests = RequestStore::new(db.clone());
    let permissions = PermissionStore::new(db.clone());
    let tasks = TaskStore::new(db.clone());
    let users = UserStore::new(db.clone());
    let groups = GroupStore::new(db.clone());
    let folders = FolderStore::new(db.clone());
    let (_artefacts_dir, artefacts) = test_artefacts();
    let directory = FakeDirectoryBackend::new();

    let requester = seed_user(&pool).await;
    let folder = seed_folder(&pool, &requester).await;
    let group = seed_group(&pool).await;
    let request = seed_request(&pool, &requester, &folder, PermissionMode::Read, RequestStatus::Pending).await;
    let permission = FolderGroupPermission::new(folder.id, group.id, PermissionMode::Read);
    seed_permission(&pool, &permission).await;

    call_approve(&requests, &permissions, &tasks, &users, &groups, &folders, &artefacts, &directory, request.id.as_str())
        .await
        .expect("approve");

    let reloaded = requests.get(request.id).await.expect("reload");
    assert_eq!(reloaded.status, RequestStatus::Approved);
    assert_eq!(reloaded.assigned_group, Some(group.id));

    let chain = tasks.siblings_of(request.id).await.expect("siblings");
    assert_eq!(chain.len(), 2, "new approval queues a workflow task and a dependent verification");
    let workflow = chain.iter().find(|t| t.kind == TaskKind::Workflow).expect("workflow task");
    let csv_path = csv_path_of(workflow).expect("workflow task must carry a written CSV path");
    assert!(tokio::fs::metadata(&csv_path).await.is_ok(), "CSV artefact must actually be written to disk");

    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn approve_rejects_a_request_that_is_not_pending(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let db = Db::from_pool(pool.clone());
    let requests = RequestStore::new(db.clone());
    let permissions = PermissionStore::new(db.clone());
    let tasks = TaskStore::new(db.clone());
    let users = UserStore::new(db.clone());
    let groups = GroupStore::new(db.clone());
    let folders = FolderStore::new(db.clone());
    let (_artefacts_dir, artefacts) = test_artefacts();
    let directory = FakeDirectoryBackend::new();

    let requester = seed_user(&pool).await;
    let folder = seed_folder(&pool, &requester).await;
    let request = seed_request(&pool, &requester, &folder, PermissionMode::Read, RequestStatus::Approved).await;

    let result = call_approve(&requests, &permissions, &tasks, &users, &groups, &folders, &artefacts, &directory, request.id.as_str()).await;
    assert!(result.is_err(), "approving an already-approved request must fail");

    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn approve_dispatches_change_classification_to_a_three_task_chain(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let db = Db::from_pool(pool.clone());
    let requests = RequestStore::new(db.clone());
    let permissions = PermissionStore::new(db.clone());
    let tasks = TaskStore::new(db.clone());
    let users = UserStore::new(db.clone());
    let groups = GroupStore::new(db.clone());
    let folders = FolderStore::new(db.clone());
    let (_artefacts_dir, artefacts) = test_artefacts();
    let directory = FakeDirectoryBackend::new();

    let requester = seed_user(&pool).await;
    let folder = seed_folder(&pool, &requester).await;
    let old_group = seed_group(&pool).await;
    let new_group = seed_group(&pool).await;
    seed_permission(&pool, &FolderGroupPermission::new(folder.id, old_group.id, PermissionMode::Read)).await;
    seed_permission(&pool, &FolderGroupPermission::new(folder.id, new_group.id, PermissionMode::Write)).await;

    let approved_read = seed_request(&pool, &requester, &folder, PermissionMode::Read, RequestStatus::Approved).await;
    requests.assign_group(approved_read.id, old_group.id).await.expect("assign old group");

    let request = seed_request(&pool, &requester, &folder, PermissionMode::Write, RequestStatus::Pending).await;

    call_approve(&requests, &permissions, &tasks, &users, &groups, &folders, &artefacts, &directory, request.id.as_str())
        .await
        .expect("approve change");

    let reloaded = requests.get(request.id).await.expect("reload");
    assert_eq!(reloaded.status, RequestStatus::Approved);
    assert_eq!(reloaded.assigned_group, Some(new_group.id));

    let chain = tasks.siblings_of(request.id).await.expect("siblings");
    assert_eq!(chain.len(), 3, "a change approval queues remove-old, add-new, and verify");
    let workflow_tasks: Vec<&Task> = chain.iter().filter(|t| t.kind == TaskKind::Workflow).collect();
    assert_eq!(workflow_tasks.len(), 2);
    for task in &workflow_tasks {
        let csv_path = csv_path_of(task).expect("every workflow task in a change approval must carry a CSV path");
        assert!(tokio::fs::metadata(&csv_path).await.is_ok());
    }

    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn reject_sets_comment_and_terminal_status(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let db = Db::from_pool(pool.clone());
    let requests = RequestStore::new(db.clone());

    let requester = seed_user(&pool).await;
    let folder = seed_folder(&pool, &requester).await;
    let request = seed_request(&pool, &requester, &folder, PermissionMode::Read, RequestStatus::Pending).await;

    let actor = UserId::from_string("user-cli-admin");
    reject(&requests, actor, request.id.as_str(), "missing manager sign-off").await.expect("reject");

    let reloaded = requests.get(request.id).await.expect("reload");
    assert_eq!(reloaded.status, RequestStatus::Rejected);
    assert_eq!(reloaded.decision_comment.as_deref(), Some("missing manager sign-off"));

    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn cancel_also_cancels_sibling_tasks(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let db = Db::from_pool(pool.clone());
    let requests = RequestStore::new(db.clone());
    let tasks = TaskStore::new(db.clone());

    let requester = seed_user(&pool).await;
    let folder = seed_folder(&pool, &requester).await;
    let request = seed_request(&pool, &requester, &folder, PermissionMode::Read, RequestStatus::Pending).await;

    let mut stray = Task::new("apply-permission-add", arw_core::TaskPayload::Workflow {
        folder_id: folder.id,
        group_id: Group::builder().build().id,
        mode: PermissionMode::Read,
        action: arw_core::TaskAction::Add,
        requester: requester.id,
        csv_path: None,
        depends_on_task_id: None,
    }, Utc::now());
    stray.permission_request_id = Some(request.id);
    tasks.insert(&stray).await.expect("seed task");

    let actor = UserId::from_string("user-cli-admin");
    cancel(&requests, &tasks, actor, request.id.as_str(), "requester withdrew").await.expect("cancel");

    let reloaded = requests.get(request.id).await.expect("reload");
    assert_eq!(reloaded.status, RequestStatus::Canceled);

    let reloaded_task = tasks.get(stray.id).await.expect("reload task");
    assert_eq!(reloaded_task.status, TaskStatus::Cancelled);

    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn revoke_marks_permission_deletion_in_progress(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let db = Db::from_pool(pool.clone());
    let requests = RequestStore::new(db.clone());
    let permissions = PermissionStore::new(db.clone());
    let tasks = TaskStore::new(db.clone());
    let users = UserStore::new(db.clone());
    let groups = GroupStore::new(db.clone());
    let folders = FolderStore::new(db.clone());
    let (_artefacts_dir, artefacts) = test_artefacts();

    let requester = seed_user(&pool).await;
    let folder = seed_folder(&pool, &requester).await;
    let group = seed_group(&pool).await;
    let permission = FolderGroupPermission::new(folder.id, group.id, PermissionMode::Read);
    seed_permission(&pool, &permission).await;

    let mut request = seed_request(&pool, &requester, &folder, PermissionMode::Read, RequestStatus::Approved).await;
    request.assigned_group = Some(group.id);
    requests.assign_group(request.id, group.id).await.expect("assign group");

    revoke(&requests, &permissions, &tasks, &users, &groups, &folders, &artefacts, request.id.as_str()).await.expect("revoke");

    let reloaded = requests.get(request.id).await.expect("reload");
    assert_eq!(reloaded.status, RequestStatus::Revoked);

    let reloaded_permission = permissions.get_by_triple(folder.id, group.id, PermissionMode::Read).await.expect("query").expect("found");
    assert!(reloaded_permission.deletion_in_progress);

    let chain = tasks.siblings_of(request.id).await.expect("siblings");
    assert_eq!(chain.len(), 2, "revocation queues a workflow task and a dependent verification");
    let workflow = chain.iter().find(|t| t.kind == TaskKind::Workflow).expect("workflow task");
    let csv_path = csv_path_of(workflow).expect("revocation workflow task must carry a written CSV path");
    assert!(tokio::fs::metadata(&csv_path).await.is_ok());

    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn purge_removes_nothing_when_nothing_is_old_enough(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let db = Db::from_pool(pool.clone());
    let tasks = TaskStore::new(db.clone());
    let notifications = NotificationStore::new(db.clone());
    let artefacts = ArtefactWriter::new(std::env::temp_dir().join("arw-cli-purge-test"), None);

    purge(&tasks, &artefacts, &notifications, 30).await.expect("purge");
    Ok(())
}
