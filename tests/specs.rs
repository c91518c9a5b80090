// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios and quantified invariants spanning the whole
//! approval/revocation lifecycle, exercised against a real orchestrator
//! wired to fake adapters.

use std::sync::Arc;

use arw_adapters::{FakeDelivery, FakeDirectoryBackend, FakeWorkflowExecutor, RunState};
use arw_core::config::TaskConfig;
use arw_core::{
    Folder, FolderGroupPermission, Group, PermissionMode, PermissionRequest, RequestStatus, Task, TaskAction, TaskPayload,
    TaskStatus, User,
};
use arw_engine::{state_machine, ArtefactRow, ArtefactWriter, AuditRecorder, Notifier, Orchestrator};
use arw_storage::{AuditStore, Db, GroupStore, NotificationStore, PermissionStore, RequestStore, TaskStore};
use chrono::Utc;

type SpecOrchestrator = Orchestrator<FakeWorkflowExecutor, FakeDirectoryBackend, FakeDelivery>;

struct Harness {
    orchestrator: SpecOrchestrator,
    workflow: FakeWorkflowExecutor,
    directory: Arc<FakeDirectoryBackend>,
    delivery: FakeDelivery,
    tasks: TaskStore,
    requests: RequestStore,
    permissions: PermissionStore,
}

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

async fn build_harness(pool: sqlx::PgPool) -> Harness {
    let db = Db::from_pool(pool);
    let tasks = TaskStore::new(db.clone());
    let requests = RequestStore::new(db.clone());
    let permissions = PermissionStore::new(db.clone());

    let artefacts = ArtefactWriter::new(std::env::temp_dir().join("arw-specs-tests"), None);
    let workflow = FakeWorkflowExecutor::new();
    let directory = Arc::new(FakeDirectoryBackend::new());
    let delivery = FakeDelivery::new();
    let notifier = Notifier::new(NotificationStore::new(db.clone()), delivery.clone(), 24, true);
    let audit = AuditRecorder::new(AuditStore::new(db.clone()));
    let config = TaskConfig { batch_size: 10, ..TaskConfig::default() };

    let orchestrator = Orchestrator::new(
        TaskStore::new(db.clone()),
        RequestStore::new(db.clone()),
        PermissionStore::new(db.clone()),
        GroupStore::new(db.clone()),
        artefacts,
        workflow.clone(),
        directory.clone(),
        notifier,
        audit,
        config,
    );

    Harness { orchestrator, workflow, directory, delivery, tasks, requests, permissions }
}

/// Scenario 1: a fresh approval with no prior grant runs its chain to
/// completion with no admin notification.
#[sqlx::test(migrations = "crates/storage/migrations")]
async fn new_approval_happy_path(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let alice = seed_user(&pool).await;
    let folder = seed_folder(&pool, &alice).await;
    let group = seed_group(&pool).await;
    let harness = build_harness(pool).await;
    let now = Utc::now();

    harness.permissions.upsert(&FolderGroupPermission::new(folder.id, group.id, PermissionMode::Read)).await.unwrap();

    let request = PermissionRequest::builder().requester(alice.id).folder_id(folder.id).mode(PermissionMode::Read).build();
    harness.requests.insert(&request).await.unwrap();

    let matching = harness.permissions.first_matching(folder.id, PermissionMode::Read).await.unwrap();
    let plan = state_machine::plan_new_approval(&request, matching.as_ref(), now).unwrap();
    assert_eq!(plan.assigned_group, group.id);
    assert_eq!(plan.tasks.len(), 2, "a new approval queues exactly a workflow task and a dependent verification");

    for task in &plan.tasks {
        harness.tasks.insert(task).await.unwrap();
    }
    harness.requests.assign_group(request.id, plan.assigned_group).await.unwrap();
    harness.requests.set_status(request.id, RequestStatus::Approved, None, Some(now)).await.unwrap();

    let workflow_task_id = plan.tasks[0].id;
    harness.workflow.set_run_state(workflow_task_id.as_str(), RunState::Success);
    harness.directory.set_user_groups(&alice.id.to_string(), vec![group.directory_dn.clone()]);

    harness.orchestrator.tick(now).await.unwrap();

    for task in &plan.tasks {
        let reloaded = harness.tasks.get(task.id).await.unwrap();
        assert_eq!(reloaded.status, TaskStatus::Completed, "task {} did not complete", task.name);
    }
    assert!(harness.delivery.calls().is_empty(), "a clean approval must not page an admin");
    Ok(())
}

/// Scenario 2: a requester who already holds the exact (folder, mode) via
/// directory membership is classified as a duplicate before any request
/// or task is created.
#[sqlx::test(migrations = "crates/storage/migrations")]
async fn duplicate_via_directory_membership_is_refused_before_any_state_change(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let alice = seed_user(&pool).await;
    let folder = seed_folder(&pool, &alice).await;
    let group = seed_group(&pool).await;
    let harness = build_harness(pool).await;

    harness.permissions.upsert(&FolderGroupPermission::new(folder.id, group.id, PermissionMode::Read)).await.unwrap();

    let inputs = state_machine::ClassificationInputs { membership_same_mode: Some(group.id), ..Default::default() };
    let classification = state_machine::classify(&inputs);
    assert_eq!(
        classification,
        arw_core::Classification::Duplicate { source: arw_core::DuplicateSource::DirectoryMembership, group: group.id }
    );
    Ok(())
}

/// Scenario 3: a change-mode approval retires the old linkage, installs
/// the new one, and chains remove -> add -> verify.
#[sqlx::test(migrations = "crates/storage/migrations")]
async fn change_request_chains_remove_then_add_then_verify(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let alice = seed_user(&pool).await;
    let folder = seed_folder(&pool, &alice).await;
    let read_group = seed_group(&pool).await;
    let write_group = seed_group(&pool).await;
    let harness = build_harness(pool).await;
    let now = Utc::now();

    let read_permission = FolderGroupPermission::new(folder.id, read_group.id, PermissionMode::Read);
    harness.permissions.upsert(&read_permission).await.unwrap();
    let write_permission = FolderGroupPermission::new(folder.id, write_group.id, PermissionMode::Write);
    harness.permissions.upsert(&write_permission).await.unwrap();

    let r0 = PermissionRequest::builder()
        .requester(alice.id)
        .folder_id(folder.id)
        .mode(PermissionMode::Read)
        .status(RequestStatus::Approved)
        .build();
    harness.requests.insert(&r0).await.unwrap();

    let r1 = PermissionRequest::builder().requester(alice.id).folder_id(folder.id).mode(PermissionMode::Write).build();
    harness.requests.insert(&r1).await.unwrap();

    let plan = state_machine::plan_change_approval(&r1, read_group.id, PermissionMode::Read, Some(&write_permission), now).unwrap();
    assert_eq!(plan.tasks.len(), 3, "a change approval chains remove, add, and verify");
    assert_eq!(plan.tasks[1].payload.depends_on_task_id(), Some(plan.tasks[0].id));
    assert_eq!(plan.tasks[2].payload.depends_on_task_id(), Some(plan.tasks[1].id));

    for task in &plan.tasks {
        harness.tasks.insert(task).await.unwrap();
    }
    Ok(())
}

/// Scenario 4: every attempt in a workflow task's budget fails; the task
/// reaches `failed`, its dependent verification is cancelled, the owning
/// request moves to `failed`, and exactly one admin notification fires.
#[sqlx::test(migrations = "crates/storage/migrations")]
async fn cascaded_failure_emits_a_single_admin_notification(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let alice = seed_user(&pool).await;
    let folder = seed_folder(&pool, &alice).await;
    let group = seed_group(&pool).await;
    let harness = build_harness(pool).await;
    let now = Utc::now();

    harness.permissions.upsert(&FolderGroupPermission::new(folder.id, group.id, PermissionMode::Read)).await.unwrap();
    let request = PermissionRequest::builder().requester(alice.id).folder_id(folder.id).status(RequestStatus::Approved).build();
    harness.requests.insert(&request).await.unwrap();

    let matching = harness.permissions.first_matching(folder.id, PermissionMode::Read).await.unwrap();
    let plan = state_machine::plan_new_approval(&request, matching.as_ref(), now).unwrap();
    let mut workflow_task = plan.tasks[0].clone();
    workflow_task.max_attempts = 1;
    harness.tasks.insert(&workflow_task).await.unwrap();
    harness.tasks.insert(&plan.tasks[1]).await.unwrap();

    harness.workflow.set_run_state(workflow_task.id.as_str(), RunState::Failed);
    harness.orchestrator.tick(now).await.unwrap();

    let settled_workflow = harness.tasks.get(workflow_task.id).await.unwrap();
    assert_eq!(settled_workflow.status, TaskStatus::Failed);
    assert_eq!(settled_workflow.attempt_count, 1);

    let settled_verification = harness.tasks.get(plan.tasks[1].id).await.unwrap();
    assert_eq!(settled_verification.status, TaskStatus::Cancelled);

    let settled_request = harness.requests.get(request.id).await.unwrap();
    assert_eq!(settled_request.status, RequestStatus::Failed);

    assert_eq!(harness.delivery.calls().len(), 1, "exactly one notification per cascaded failure");
    Ok(())
}

/// Scenario 5: a workflow executor that reports a transient auth failure
/// on its first attempt is retried, not immediately failed.
#[sqlx::test(migrations = "crates/storage/migrations")]
async fn transient_workflow_failure_is_retried_not_failed(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let alice = seed_user(&pool).await;
    let folder = seed_folder(&pool, &alice).await;
    let group = seed_group(&pool).await;
    let harness = build_harness(pool).await;
    let now = Utc::now();

    harness.permissions.upsert(&FolderGroupPermission::new(folder.id, group.id, PermissionMode::Read)).await.unwrap();
    let request = PermissionRequest::builder().requester(alice.id).folder_id(folder.id).status(RequestStatus::Approved).build();
    harness.requests.insert(&request).await.unwrap();

    let mut task = Task::new(
        "apply-permission-add",
        TaskPayload::Workflow {
            folder_id: folder.id,
            group_id: group.id,
            mode: PermissionMode::Read,
            action: TaskAction::Add,
            requester: alice.id,
            csv_path: None,
            depends_on_task_id: None,
        },
        now,
    );
    task.permission_request_id = Some(request.id);
    harness.tasks.insert(&task).await.unwrap();
    harness.workflow.fail_next_submit();

    harness.orchestrator.tick(now).await.unwrap();

    let reloaded = harness.tasks.get(task.id).await.unwrap();
    assert_eq!(reloaded.status, TaskStatus::Retry);
    assert_eq!(reloaded.attempt_count, 1);
    Ok(())
}

/// Scenario 6: calling the notifier twice with identical (error-type,
/// service, message) within the cooldown window sends exactly once.
#[sqlx::test(migrations = "crates/storage/migrations")]
async fn notification_dedup_sends_once_within_cooldown(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let db = Db::from_pool(pool);
    let delivery = FakeDelivery::new();
    let notifier = Notifier::new(NotificationStore::new(db.clone()), delivery.clone(), 24, true);
    let verify_store = NotificationStore::new(db);
    let now = Utc::now();

    notifier.notify_error("DAG_EXECUTION_FAILED_AFTER_RETRIES", "airflow", "run failed", now).await.unwrap();
    notifier
        .notify_error("DAG_EXECUTION_FAILED_AFTER_RETRIES", "airflow", "run failed", now + chrono::Duration::minutes(5))
        .await
        .unwrap();

    assert_eq!(delivery.calls().len(), 1, "identical errors within cooldown must send exactly once");

    let fingerprint = arw_core::fingerprint("DAG_EXECUTION_FAILED_AFTER_RETRIES", "airflow", "run failed");
    let notification = verify_store.find_by_fingerprint(&fingerprint).await.unwrap().expect("notification recorded");
    assert_eq!(notification.occurrence_count, 2);
    assert!(notification.notification_sent);
    Ok(())
}

/// Invariant: a written CSV artefact round-trips to the same seven fields
/// in the same order with correct action and mode codes.
#[tokio::test]
async fn artefact_round_trip_preserves_fields_in_order() {
    let alice = User::builder().build();
    let group = Group::builder().build();
    let folder = Folder::builder().creator(alice.id).build();
    let request_id = arw_core::RequestId::new();

    let row = ArtefactRow::for_request(request_id, &alice, &group, &folder, TaskAction::Add, PermissionMode::Read, None);
    let dir = tempfile::tempdir().expect("tempdir");
    let writer = ArtefactWriter::new(dir.path(), None);
    let path = writer.write_single(request_id, &alice, &group, &folder, TaskAction::Add, PermissionMode::Read, Utc::now()).await.unwrap();

    let contents = tokio::fs::read_to_string(&path).await.expect("read artefact");
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("UserName;ADGroup;idTarea;idAccion;MatriculaUsu;idRecurso;idModo"));
    let data_line = lines.next().expect("data row");
    let fields: Vec<&str> = data_line.split(';').collect();
    assert_eq!(fields.len(), 7);
    assert_eq!(fields[0], row.user_name);
    assert_eq!(fields[1], row.ad_group);
    assert_eq!(fields[3], "1", "add action must encode as idAccion=1");
    assert_eq!(fields[6], "1", "read mode must encode as idModo=1");
}

/// Invariant: for every task, 0 <= attempt_count <= max_attempts.
#[sqlx::test(migrations = "crates/storage/migrations")]
async fn attempt_count_never_exceeds_max_attempts(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let alice = seed_user(&pool).await;
    let folder = seed_folder(&pool, &alice).await;
    let group = seed_group(&pool).await;
    let harness = build_harness(pool).await;
    let now = Utc::now();

    harness.permissions.upsert(&FolderGroupPermission::new(folder.id, group.id, PermissionMode::Read)).await.unwrap();
    let request = PermissionRequest::builder().requester(alice.id).folder_id(folder.id).status(RequestStatus::Approved).build();
    harness.requests.insert(&request).await.unwrap();

    let mut task = Task::new(
        "apply-permission-add",
        TaskPayload::Workflow {
            folder_id: folder.id,
            group_id: group.id,
            mode: PermissionMode::Read,
            action: TaskAction::Add,
            requester: alice.id,
            csv_path: None,
            depends_on_task_id: None,
        },
        now,
    );
    task.permission_request_id = Some(request.id);
    task.max_attempts = 3;
    harness.tasks.insert(&task).await.unwrap();
    harness.workflow.set_run_state(task.id.as_str(), RunState::Failed);

    for _ in 0..5 {
        let _ = harness.orchestrator.tick(now).await;
    }

    let settled = harness.tasks.get(task.id).await.unwrap();
    assert!(settled.attempt_count <= settled.max_attempts);
    assert!(settled.attempt_count > 0);
    Ok(())
}
