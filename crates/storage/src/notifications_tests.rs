// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arw_core::AdminNotification;

#[sqlx::test(migrations = "./migrations")]
async fn find_by_fingerprint_matches_after_insert(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let store = NotificationStore::new(Db::from_pool(pool));
    let now = Utc::now();
    let notification = AdminNotification::new("airflow", "workflow-executor", "connection refused", now);
    store.insert(&notification).await.expect("insert");

    let found = store
        .find_by_fingerprint(&notification.fingerprint)
        .await
        .expect("query")
        .expect("found");
    assert_eq!(found.id, notification.id);
    assert_eq!(found.occurrence_count, 1);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn record_occurrence_increments_count(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let store = NotificationStore::new(Db::from_pool(pool));
    let now = Utc::now();
    let notification = AdminNotification::new("ldap", "directory-backend", "timeout", now);
    store.insert(&notification).await.expect("insert");

    store.record_occurrence(notification.id, now + chrono::Duration::minutes(1)).await.expect("record");

    let found = store.find_by_fingerprint(&notification.fingerprint).await.expect("query").expect("found");
    assert_eq!(found.occurrence_count, 2);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn purge_resolved_older_than_only_removes_stale_resolved(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let store = NotificationStore::new(Db::from_pool(pool));
    let cutoff = Utc::now();

    let mut resolved_stale = AdminNotification::new("airflow", "svc-a", "boom", cutoff - chrono::Duration::days(2));
    resolved_stale.is_resolved = true;
    resolved_stale.last_occurrence = cutoff - chrono::Duration::days(2);
    store.insert(&resolved_stale).await.expect("insert stale");

    let mut resolved_fresh = AdminNotification::new("airflow", "svc-b", "boom", cutoff);
    resolved_fresh.is_resolved = true;
    resolved_fresh.last_occurrence = cutoff + chrono::Duration::days(1);
    store.insert(&resolved_fresh).await.expect("insert fresh");

    let unresolved = AdminNotification::new("airflow", "svc-c", "boom", cutoff - chrono::Duration::days(3));
    store.insert(&unresolved).await.expect("insert unresolved");

    let purged = store.purge_resolved_older_than(cutoff).await.expect("purge");
    assert_eq!(purged, 1);

    assert!(store.find_by_fingerprint(&resolved_stale.fingerprint).await.expect("query").is_none());
    assert!(store.find_by_fingerprint(&resolved_fresh.fingerprint).await.expect("query").is_some());
    assert!(store.find_by_fingerprint(&unresolved.fingerprint).await.expect("query").is_some());
    Ok(())
}
