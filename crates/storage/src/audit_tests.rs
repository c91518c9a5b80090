// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arw_core::AuditEvent;

#[sqlx::test(migrations = "./migrations")]
async fn record_then_fetch_by_resource(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let store = AuditStore::new(Db::from_pool(pool));
    let now = Utc::now();
    let event = AuditEvent::builder().resource_type("folder").resource_id("fld-abc").occurred_at(now).build();
    store.record(&event).await.expect("record");

    let trail = store.for_resource("folder", "fld-abc").await.expect("fetch");
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].id, event.id);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn for_resource_orders_chronologically(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let store = AuditStore::new(Db::from_pool(pool));
    let now = Utc::now();
    let first = AuditEvent::builder()
        .resource_type("permission_request")
        .resource_id("req-1")
        .occurred_at(now - chrono::Duration::minutes(5))
        .build();
    let second = AuditEvent::builder()
        .resource_type("permission_request")
        .resource_id("req-1")
        .occurred_at(now)
        .build();
    store.record(&second).await.expect("record second");
    store.record(&first).await.expect("record first");

    let trail = store.for_resource("permission_request", "req-1").await.expect("fetch");
    assert_eq!(trail.iter().map(|e| e.id).collect::<Vec<_>>(), vec![first.id, second.id]);
    Ok(())
}
