// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit trail store (C8 backing).
//!
//! Every write here runs against the pool directly rather than inside a
//! caller's transaction: an audit entry must still land even if the
//! state-changing operation it describes rolls back on a later step.

use arw_core::{AuditEvent, AuditEventId, Error, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::db::{sqlx_err, Db};

#[derive(FromRow)]
struct AuditEventRow {
    id: String,
    actor: Option<String>,
    event_type: String,
    action: String,
    resource_type: String,
    resource_id: String,
    description: String,
    metadata: serde_json::Value,
    ip_address: Option<String>,
    user_agent: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl From<AuditEventRow> for AuditEvent {
    fn from(row: AuditEventRow) -> Self {
        AuditEvent {
            id: AuditEventId::from_string(row.id),
            actor: row.actor.map(UserId::from_string),
            event_type: row.event_type,
            action: row.action,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            description: row.description,
            metadata: row.metadata,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            occurred_at: row.occurred_at,
        }
    }
}

pub struct AuditStore {
    db: Db,
}

impl AuditStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn record(&self, event: &AuditEvent) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_events
                (id, actor, event_type, action, resource_type, resource_id,
                 description, metadata, ip_address, user_agent, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.id.as_str())
        .bind(event.actor.map(|id| id.to_string()))
        .bind(&event.event_type)
        .bind(&event.action)
        .bind(&event.resource_type)
        .bind(&event.resource_id)
        .bind(&event.description)
        .bind(&event.metadata)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(event.occurred_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to record audit event", e))?;
        Ok(())
    }

    pub async fn for_resource(&self, resource_type: &str, resource_id: &str) -> Result<Vec<AuditEvent>, Error> {
        let rows: Vec<AuditEventRow> = sqlx::query_as(
            "SELECT * FROM audit_events WHERE resource_type = $1 AND resource_id = $2 ORDER BY occurred_at ASC",
        )
        .bind(resource_type)
        .bind(resource_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to fetch audit trail", e))?;
        Ok(rows.into_iter().map(AuditEvent::from).collect())
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
