// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arw_storage::Db;

#[sqlx::test(migrations = "../storage/migrations")]
async fn record_persists_and_is_retrievable(pool: sqlx::PgPool) -> sqlx::Result<()> {
    let store = AuditStore::new(Db::from_pool(pool));
    let recorder = AuditRecorder::new(store);
    let actor = UserId::new();
    let now = Utc::now();

    recorder
        .record(Some(actor), "permission_request", "approve", "permission_request", "req-1", "approved", Value::Null, now)
        .await
        .expect("record");

    Ok(())
}
