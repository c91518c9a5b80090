// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use arw_adapters::{FakeDirectoryBackend, GroupRecord, UserRecord};
use arw_core::Group;
use arw_storage::{Db, GroupStore, MembershipStore, UserStore};
use chrono::Utc;

use super::*;

#[sqlx::test(migrations = "../storage/migrations")]
async fn sync_users_creates_matches_and_deactivates(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let db = Db::from_pool(pool);
    let users = UserStore::new(db.clone());
    let directory = FakeDirectoryBackend::new();
    let now = Utc::now();

    directory.set_user_listing(vec![UserRecord {
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        display_name: "Alice Example".to_string(),
        dn: "CN=alice,OU=Users,DC=corp".to_string(),
        disabled: false,
    }]);
    sync_users(&directory, &users, now).await.expect("first pass");
    let created = users.find_by_directory_dn("CN=alice,OU=Users,DC=corp").await.expect("query").expect("found");
    assert_eq!(created.username, "alice");
    assert!(created.active);

    // Second pass omits alice: she is soft-deactivated, never removed.
    let later = now + chrono::Duration::seconds(1);
    directory.set_user_listing(vec![]);
    sync_users(&directory, &users, later).await.expect("second pass");
    let after = users.get(created.id).await.expect("get");
    assert!(!after.active);

    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn sync_groups_matches_existing_row_by_directory_dn(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let db = Db::from_pool(pool);
    let groups = GroupStore::new(db.clone());
    let directory = FakeDirectoryBackend::new();
    let now = Utc::now();

    let existing = Group::new("fin-readers", "CN=fin-readers,OU=Groups,DC=corp");
    groups.upsert(&existing).await.expect("seed");

    directory.set_group_listing(vec![GroupRecord {
        name: "fin-readers".to_string(),
        dn: "CN=fin-readers,OU=Groups,DC=corp".to_string(),
    }]);
    sync_groups(&directory, &groups, now).await.expect("sync");

    let reloaded = groups.get(existing.id).await.expect("get");
    assert_eq!(reloaded.id, existing.id, "matched by directory_dn rather than creating a duplicate");
    assert!(reloaded.active);

    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn sync_user_permissions_upserts_observed_membership(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let db = Db::from_pool(pool);
    let users = UserStore::new(db.clone());
    let groups = GroupStore::new(db.clone());
    let memberships = MembershipStore::new(db.clone());
    let directory = FakeDirectoryBackend::new();
    let now = Utc::now();

    let user = arw_core::User::new("alice", "alice@example.com", "Alice Example")
        .directory_dn("CN=alice,OU=Users,DC=corp");
    users.upsert(&user).await.expect("seed user");
    let group = Group::new("fin-readers", "CN=fin-readers,OU=Groups,DC=corp");
    groups.upsert(&group).await.expect("seed group");

    directory.set_user_groups("alice", vec!["CN=fin-readers,OU=Groups,DC=corp".to_string()]);
    sync_user_permissions(&directory, &users, &groups, &memberships, now).await.expect("sync");

    assert!(memberships.is_active_member(user.id, group.id).await.expect("query"));

    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn sync_active_memberships_upserts_from_group_roster(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let db = Db::from_pool(pool);
    let users = UserStore::new(db.clone());
    let groups = GroupStore::new(db.clone());
    let memberships = MembershipStore::new(db.clone());
    let directory = FakeDirectoryBackend::new();
    let now = Utc::now();

    let user = arw_core::User::new("alice", "alice@example.com", "Alice Example")
        .directory_dn("CN=alice,OU=Users,DC=corp");
    users.upsert(&user).await.expect("seed user");
    let group = Group::new("fin-readers", "CN=fin-readers,OU=Groups,DC=corp");
    groups.upsert(&group).await.expect("seed group");

    directory.add_group("CN=fin-readers,OU=Groups,DC=corp", vec!["CN=alice,OU=Users,DC=corp".to_string()]);
    sync_active_memberships(&directory, &users, &groups, &memberships, now).await.expect("sync");

    assert!(memberships.is_active_member(user.id, group.id).await.expect("query"));

    Ok(())
}
