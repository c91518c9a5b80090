// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Administrative command-line interface (arw).
//!
//! Talks directly to storage: no daemon process is involved. Each command
//! fetches the state it needs, composes a plan with the pure state-machine
//! functions, and persists the outcome in the same invocation.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arw_adapters::{DirectoryBackend, LdapConfig, LdapDirectoryBackend};
use arw_core::config::Config;
use arw_core::{
    Classification, DuplicateSource, FolderId, GroupId, PermissionMode, PermissionRequest,
    RequestId, RequestStatus, TaskAction, UserId,
};
use arw_engine::state_machine::{self, ClassificationInputs};
use arw_engine::ArtefactWriter;
use arw_storage::{Db, FolderStore, GroupStore, NotificationStore, PermissionStore, RequestStore, TaskStore, UserStore};
use clap::{Parser, Subcommand};
use chrono::{Duration, Utc};

#[derive(Parser)]
#[command(name = "arw", about = "Administer access-request permissions and tasks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Approve a pending request: classify it against existing grants,
    /// build the matching task chain, write its CSV artefact(s), and queue
    /// the chain.
    Approve {
        request_id: String,
    },
    /// Reject a pending request.
    Reject {
        request_id: String,
        /// Reason recorded on the request.
        #[arg(long, default_value = "rejected by administrator")]
        comment: String,
    },
    /// Cancel a still-pending request and any queued tasks it spawned.
    Cancel {
        request_id: String,
        #[arg(long, default_value = "cancelled by administrator")]
        reason: String,
    },
    /// Revoke an approved request's grant, writing a remove CSV and queuing
    /// the removal/verify chain.
    Revoke {
        request_id: String,
    },
    /// Delete terminal tasks, spent CSV artefacts, and resolved notifications
    /// older than `--days`.
    Purge {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    let db = Db::connect(&config.database_url).await.context("failed to connect to the database")?;

    let requests = RequestStore::new(db.clone());
    let permissions = PermissionStore::new(db.clone());
    let tasks = TaskStore::new(db.clone());
    let groups = GroupStore::new(db.clone());
    let users = UserStore::new(db.clone());
    let folders = FolderStore::new(db.clone());
    let notifications = NotificationStore::new(db.clone());
    let artefacts = ArtefactWriter::new(config.csv_output_dir.clone(), config.ad_domain_prefix.clone());

    let directory = Arc::new(LdapDirectoryBackend::new(LdapConfig {
        url: config.ldap.url.clone(),
        bind_dn: config.ldap.bind_dn.clone(),
        bind_password: config.ldap.bind_password.clone(),
        base_dn: config.ldap.base_dn.clone(),
        group_base_dn: config.ldap.group_base_dn.clone(),
        search_ous: config.ldap.search_ous.clone(),
        username_attr: config.ldap.username_attr.clone(),
        email_attr: config.ldap.email_attr.clone(),
        display_name_attr: config.ldap.display_name_attr.clone(),
    }));

    // There is no authenticated admin session on the command line; the
    // local operator running `arw` is the actor of record.
    let actor = UserId::from_string("user-cli-admin");

    match cli.command {
        Command::Approve { request_id } => {
            approve(&requests, &permissions, &tasks, &users, &groups, &folders, &artefacts, directory.as_ref(), actor, &request_id).await
        }
        Command::Reject { request_id, comment } => reject(&requests, actor, &request_id, &comment).await,
        Command::Cancel { request_id, reason } => cancel(&requests, &tasks, actor, &request_id, &reason).await,
        Command::Revoke { request_id } => revoke(&requests, &permissions, &tasks, &users, &groups, &folders, &artefacts, &request_id).await,
        Command::Purge { days } => purge(&tasks, &artefacts, &notifications, days).await,
    }
}

fn require_pending(request: &PermissionRequest) -> Result<()> {
    if request.status != RequestStatus::Pending {
        bail!("request {} is {}, not pending", request.id, request.status);
    }
    Ok(())
}

/// The group behind an active linkage matching `(folder_id, mode)`, if the
/// requester's directory membership actually puts them in that group.
async fn membership_grant(
    permissions: &PermissionStore,
    groups: &GroupStore,
    folder_id: FolderId,
    mode: PermissionMode,
    member_dns: &[String],
) -> Result<Option<GroupId>> {
    let Some(permission) = permissions.first_matching(folder_id, mode).await? else {
        return Ok(None);
    };
    let group = groups.get(permission.group_id).await?;
    if member_dns.iter().any(|dn| dn.eq_ignore_ascii_case(&group.directory_dn)) {
        Ok(Some(permission.group_id))
    } else {
        Ok(None)
    }
}

/// Resolves everything [`state_machine::classify`] needs for one
/// (requester, folder, mode) triple against live storage and directory
/// state.
///
/// `most_recent_terminal_failed_or_rejected` is left unset here: retry
/// provenance only matters at request submission (no such entry point
/// exists in this CLI), and a `Retry` classification is handled identically
/// to `New` by [`approve`] regardless.
async fn classification_inputs(
    requests: &RequestStore,
    permissions: &PermissionStore,
    groups: &GroupStore,
    request: &PermissionRequest,
    member_dns: &[String],
) -> Result<ClassificationInputs> {
    let other_mode = request.mode.other();

    let approved_same = requests.approved_for_triple(request.requester, request.folder_id, request.mode).await?;
    let approved_other = requests.approved_for_triple(request.requester, request.folder_id, other_mode).await?;
    let pending_other = requests.pending_for_triple(request.requester, request.folder_id, other_mode).await?;

    let membership_same_mode = membership_grant(permissions, groups, request.folder_id, request.mode, member_dns).await?;
    let membership_other_mode = membership_grant(permissions, groups, request.folder_id, other_mode, member_dns).await?.is_some();

    Ok(ClassificationInputs {
        approved_same_mode: approved_same.as_ref().and_then(|r| r.assigned_group),
        membership_same_mode,
        approved_other_mode: approved_other.map(|r| r.id),
        pending_other_mode: pending_other.map(|r| r.id),
        membership_other_mode,
        most_recent_terminal_failed_or_rejected: None,
    })
}

#[allow(clippy::too_many_arguments)]
async fn approve<Dir: DirectoryBackend>(
    requests: &RequestStore,
    permissions: &PermissionStore,
    tasks: &TaskStore,
    users: &UserStore,
    groups: &GroupStore,
    folders: &FolderStore,
    artefacts: &ArtefactWriter,
    directory: &Dir,
    actor: UserId,
    request_id: &str,
) -> Result<()> {
    let now = Utc::now();
    let request = requests.get(RequestId::from_string(request_id)).await.context("request not found")?;
    require_pending(&request)?;

    let requester = users.get(request.requester).await.context("requester not found")?;
    let folder = folders.get(request.folder_id).await.context("folder not found")?;
    let member_dns = directory
        .user_groups(&requester.username)
        .await
        .map_err(|e| anyhow::anyhow!("directory unreachable during approval: {e}"))?;

    let inputs = classification_inputs(requests, permissions, groups, &request, &member_dns).await?;
    let classification = state_machine::classify(&inputs);

    let matching = permissions.first_matching(request.folder_id, request.mode).await?;

    let (mut plan, superseded) = match classification {
        Classification::Duplicate { source, group } => {
            bail!("request {} duplicates an existing grant (group {group}) via {source:?}; nothing to approve", request.id);
        }
        Classification::Change { existing_request: Some(old_request_id), source } if source != DuplicateSource::PendingRequest => {
            let old_request = requests.get(old_request_id).await.context("existing approved request not found")?;
            let old_group_id = old_request
                .assigned_group
                .ok_or_else(|| anyhow::anyhow!("existing approved request {} has no assigned group", old_request.id))?;
            let plan = state_machine::plan_change_approval(&request, old_group_id, request.mode.other(), matching.as_ref(), now)?;
            (plan, None)
        }
        Classification::Change { source: DuplicateSource::DirectoryMembership, .. } => {
            let old_group_id = membership_grant(permissions, groups, request.folder_id, request.mode.other(), &member_dns)
                .await?
                .ok_or_else(|| anyhow::anyhow!("directory membership classification lost its grant between classify and plan"))?;
            let plan = state_machine::plan_change_approval(&request, old_group_id, request.mode.other(), matching.as_ref(), now)?;
            (plan, None)
        }
        Classification::Change { existing_request, .. } => {
            // `PendingRequest`-sourced: no existing grant to remove, only a
            // superseded pending sibling to cancel once this one is queued.
            (state_machine::plan_new_approval(&request, matching.as_ref(), now)?, existing_request)
        }
        Classification::New | Classification::Retry { .. } => {
            (state_machine::plan_new_approval(&request, matching.as_ref(), now)?, None)
        }
    };

    for task in &mut plan.tasks {
        let Some(csv_path) = artefact_for_workflow_task(artefacts, &request, &requester, &folder, groups, task, now).await? else {
            continue;
        };
        set_csv_path(task, csv_path);
    }

    for task in &plan.tasks {
        tasks.insert(task).await?;
    }
    requests.assign_group(request.id, plan.assigned_group).await?;
    requests.set_status(request.id, RequestStatus::Approved, None, Some(now)).await?;

    if let Some(old_request_id) = superseded {
        let comment = state_machine::superseded_comment(request.id);
        tasks.cancel_siblings(old_request_id, actor, &comment).await?;
        requests.set_status(old_request_id, RequestStatus::Canceled, Some(&comment), Some(now)).await?;
    }

    println!("approved {} (group {})", request.id, plan.assigned_group);
    Ok(())
}

/// Writes the CSV artefact for one workflow task in a just-built approval
/// plan. `Verification` tasks and non-workflow variants never get one.
async fn artefact_for_workflow_task(
    artefacts: &ArtefactWriter,
    request: &PermissionRequest,
    requester: &arw_core::User,
    folder: &arw_core::Folder,
    groups: &GroupStore,
    task: &arw_core::Task,
    now: chrono::DateTime<Utc>,
) -> Result<Option<String>> {
    let arw_core::TaskPayload::Workflow { group_id, mode, action, .. } = &task.payload else {
        return Ok(None);
    };
    let group = groups.get(*group_id).await?;
    let path = artefacts.write_single(request.id, requester, &group, folder, *action, *mode, now).await?;
    Ok(Some(path.to_string_lossy().into_owned()))
}

fn set_csv_path(task: &mut arw_core::Task, path: String) {
    if let arw_core::TaskPayload::Workflow { csv_path, .. } = &mut task.payload {
        *csv_path = Some(path);
    }
}

async fn reject(requests: &RequestStore, actor: UserId, request_id: &str, comment: &str) -> Result<()> {
    let now = Utc::now();
    let request = requests.get(RequestId::from_string(request_id)).await.context("request not found")?;
    require_pending(&request)?;

    let rejected = state_machine::reject(request, comment, actor, now);
    requests.set_status(rejected.id, rejected.status, rejected.decision_comment.as_deref(), rejected.validated_at).await?;

    println!("rejected {}", rejected.id);
    Ok(())
}

async fn cancel(requests: &RequestStore, tasks: &TaskStore, actor: UserId, request_id: &str, reason: &str) -> Result<()> {
    let now = Utc::now();
    let request = requests.get(RequestId::from_string(request_id)).await.context("request not found")?;
    require_pending(&request)?;

    let cancelled = state_machine::cancel(request, reason, now);
    let sibling_count = tasks.cancel_siblings(cancelled.id, actor, reason).await?;
    requests.set_status(cancelled.id, cancelled.status, cancelled.decision_comment.as_deref(), cancelled.validated_at).await?;

    println!("cancelled {} ({sibling_count} task(s) cancelled)", cancelled.id);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn revoke(
    requests: &RequestStore,
    permissions: &PermissionStore,
    tasks: &TaskStore,
    users: &UserStore,
    groups: &GroupStore,
    folders: &FolderStore,
    artefacts: &ArtefactWriter,
    request_id: &str,
) -> Result<()> {
    let now = Utc::now();
    let request = requests.get(RequestId::from_string(request_id)).await.context("request not found")?;
    if request.status != RequestStatus::Approved {
        bail!("request {} is {}, not approved", request.id, request.status);
    }
    let group_id = request
        .assigned_group
        .ok_or_else(|| anyhow::anyhow!("approved request {} has no assigned group", request.id))?;

    let permission = permissions
        .get_by_triple(request.folder_id, group_id, request.mode)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no permission linkage for this request's (folder, group, mode)"))?;
    permissions.set_deletion_in_progress(permission.id, true).await?;

    let requester = users.get(request.requester).await.context("requester not found")?;
    let folder = folders.get(request.folder_id).await.context("folder not found")?;
    let group = groups.get(group_id).await.context("assigned group not found")?;

    let mut plan = state_machine::plan_revocation(&request, group_id, TaskAction::Remove, now);
    let path = artefacts.write_single(request.id, &requester, &group, &folder, TaskAction::Remove, request.mode, now).await?;
    set_csv_path(&mut plan.tasks[0], path.to_string_lossy().into_owned());

    for task in &plan.tasks {
        tasks.insert(task).await?;
    }
    requests.set_status(request.id, RequestStatus::Revoked, None, Some(now)).await?;

    println!("revoke queued for {} (group {})", request.id, group_id);
    Ok(())
}

async fn purge(tasks: &TaskStore, artefacts: &ArtefactWriter, notifications: &NotificationStore, days: i64) -> Result<()> {
    let cutoff = Utc::now() - Duration::days(days);

    let purged_tasks = tasks.purge(cutoff).await?;
    let purged_artefacts = artefacts.cleanup_older_than(cutoff).await?;
    let purged_notifications = notifications.purge_resolved_older_than(cutoff).await?;

    println!(
        "purged {purged_tasks} task(s), {purged_artefacts} artefact(s), {purged_notifications} notification(s) older than {days} day(s)"
    );
    Ok(())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
