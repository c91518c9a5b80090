// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arw_core::Group;

#[sqlx::test(migrations = "./migrations")]
async fn upsert_then_get_roundtrips(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let store = GroupStore::new(Db::from_pool(pool));
    let group = Group::builder().classification("restricted").build();
    store.upsert(&group).await.expect("insert");

    let fetched = store.get(group.id).await.expect("get");
    assert_eq!(fetched, group);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn find_by_directory_dn_matches_exact_dn(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let store = GroupStore::new(Db::from_pool(pool));
    let group = Group::builder().directory_dn("CN=proj_x_r,OU=Groups,DC=example,DC=com").build();
    store.upsert(&group).await.expect("insert");

    let found = store
        .find_by_directory_dn("CN=proj_x_r,OU=Groups,DC=example,DC=com")
        .await
        .expect("query")
        .expect("group found");
    assert_eq!(found.id, group.id);

    assert!(store.find_by_directory_dn("CN=missing,DC=example,DC=com").await.expect("query").is_none());
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn deactivate_unsynced_since_only_affects_stale_groups(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let store = GroupStore::new(Db::from_pool(pool));
    let cutoff = Utc::now();

    let mut stale = Group::builder().name("proj_a_r").directory_dn("CN=proj_a_r,DC=example,DC=com").build();
    stale.last_synced = Some(cutoff - chrono::Duration::hours(1));
    store.upsert(&stale).await.expect("insert stale");

    let affected = store.deactivate_unsynced_since(cutoff).await.expect("deactivate");
    assert_eq!(affected, 1);
    assert!(!store.get(stale.id).await.expect("get").active);
    Ok(())
}
