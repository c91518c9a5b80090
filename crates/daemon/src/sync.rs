// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catalogue sub-sync (C9): four independent passes that keep the local
//! user/group/membership catalogue aligned with the directory. Each pass
//! matches an existing catalogue row by `directory_dn` before creating a
//! new one, and never hard-deletes: rows absent from the directory are
//! marked inactive instead.

use arw_adapters::DirectoryBackend;
use arw_core::{Error, Group, User, UserGroupMembership};
use arw_storage::{GroupStore, MembershipStore, UserStore};
use chrono::{DateTime, Utc};

/// Discovers and upserts every user the directory reports, then marks
/// inactive any catalogue user not touched since `now`.
pub async fn sync_users(directory: &impl DirectoryBackend, users: &UserStore, now: DateTime<Utc>) -> Result<(), Error> {
    let records = directory.list_users().await.map_err(directory_err)?;
    for record in records {
        let mut user = match users.find_by_directory_dn(&record.dn).await? {
            Some(existing) => existing,
            None => User::new(&record.username, &record.email, &record.display_name),
        };
        user.username = record.username;
        user.email = record.email;
        user.display_name = record.display_name;
        user.directory_dn = Some(record.dn);
        user.active = !record.disabled;
        user.last_synced = Some(now);
        users.upsert(&user).await?;
    }
    users.deactivate_unsynced_since(now).await?;
    Ok(())
}

/// Discovers and upserts every group the directory reports, then marks
/// inactive any catalogue group not touched since `now`.
pub async fn sync_groups(directory: &impl DirectoryBackend, groups: &GroupStore, now: DateTime<Utc>) -> Result<(), Error> {
    let records = directory.list_groups().await.map_err(directory_err)?;
    for record in records {
        let mut group = match groups.find_by_directory_dn(&record.dn).await? {
            Some(existing) => existing,
            None => Group::new(&record.name, &record.dn),
        };
        group.name = record.name;
        group.directory_dn = record.dn;
        group.active = true;
        group.last_synced = Some(now);
        groups.upsert(&group).await?;
    }
    groups.deactivate_unsynced_since(now).await?;
    Ok(())
}

/// For every active catalogue user, re-derives their directory group
/// membership and upserts the observed `(user, group)` pairs. Groups the
/// directory reports that are not yet in the catalogue are skipped; the
/// groups sub-sync will pick them up on its own cadence.
pub async fn sync_user_permissions(
    directory: &impl DirectoryBackend,
    users: &UserStore,
    groups: &GroupStore,
    memberships: &MembershipStore,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    for user in users.list_active().await? {
        let group_dns = match directory.user_groups(&user.username).await {
            Ok(dns) => dns,
            Err(_) => continue,
        };
        for dn in group_dns {
            let Some(group) = groups.find_by_directory_dn(&dn).await? else { continue };
            let membership = UserGroupMembership::new(user.id, group.id, now);
            memberships.upsert(&membership).await?;
        }
    }
    Ok(())
}

/// For every active catalogue group, re-derives its directory member list
/// and upserts the observed `(user, group)` pairs. Members the directory
/// reports that are not yet catalogued users are skipped; the users
/// sub-sync will pick them up on its own cadence.
pub async fn sync_active_memberships(
    directory: &impl DirectoryBackend,
    users: &UserStore,
    groups: &GroupStore,
    memberships: &MembershipStore,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    for group in groups.list_active().await? {
        let member_dns = match directory.group_members(&group.directory_dn).await {
            Ok(dns) => dns,
            Err(_) => continue,
        };
        for dn in member_dns {
            let Some(user) = users.find_by_directory_dn(&dn).await? else { continue };
            let membership = UserGroupMembership::new(user.id, group.id, now);
            memberships.upsert(&membership).await?;
        }
    }
    Ok(())
}

fn directory_err(e: arw_adapters::DirectoryError) -> Error {
    Error::with_source(arw_core::ErrorKind::Transient, "directory sync pass failed", e)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
