// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arw_core::User;

#[sqlx::test(migrations = "./migrations")]
async fn upsert_then_get_roundtrips(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let store = UserStore::new(Db::from_pool(pool));
    let user = User::builder().department("engineering").build();
    store.upsert(&user).await.expect("insert");

    let fetched = store.get(user.id).await.expect("get");
    assert_eq!(fetched, user);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn upsert_again_updates_in_place(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let store = UserStore::new(Db::from_pool(pool));
    let mut user = User::builder().build();
    store.upsert(&user).await.expect("insert");

    user.department = Some("legal".to_string());
    user.active = false;
    store.upsert(&user).await.expect("update");

    let fetched = store.get(user.id).await.expect("get");
    assert_eq!(fetched.department.as_deref(), Some("legal"));
    assert!(!fetched.active);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn deactivate_unsynced_since_leaves_fresh_users_active(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let store = UserStore::new(Db::from_pool(pool));
    let cutoff = Utc::now();

    let mut stale = User::builder().username("stale").email("stale@example.com").build();
    stale.last_synced = Some(cutoff - chrono::Duration::hours(1));
    store.upsert(&stale).await.expect("insert stale");

    let mut fresh = User::builder().username("fresh").email("fresh@example.com").build();
    fresh.last_synced = Some(cutoff + chrono::Duration::hours(1));
    store.upsert(&fresh).await.expect("insert fresh");

    let affected = store.deactivate_unsynced_since(cutoff).await.expect("deactivate");
    assert_eq!(affected, 1);

    assert!(!store.get(stale.id).await.expect("get stale").active);
    assert!(store.get(fresh.id).await.expect("get fresh").active);
    Ok(())
}
