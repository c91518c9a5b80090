// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin notification dedup/cooldown store (C4 backing).

use arw_core::{AdminNotification, Error, NotificationId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::db::{sqlx_err, Db};

#[derive(FromRow)]
struct NotificationRow {
    id: String,
    fingerprint: String,
    error_type: String,
    service_name: String,
    error_message: String,
    first_occurrence: DateTime<Utc>,
    last_occurrence: DateTime<Utc>,
    occurrence_count: i32,
    notification_sent: bool,
    notification_sent_at: Option<DateTime<Utc>>,
    is_resolved: bool,
    resolved_at: Option<DateTime<Utc>>,
}

impl From<NotificationRow> for AdminNotification {
    fn from(row: NotificationRow) -> Self {
        AdminNotification {
            id: NotificationId::from_string(row.id),
            fingerprint: row.fingerprint,
            error_type: row.error_type,
            service_name: row.service_name,
            error_message: row.error_message,
            first_occurrence: row.first_occurrence,
            last_occurrence: row.last_occurrence,
            occurrence_count: row.occurrence_count.max(0) as u32,
            notification_sent: row.notification_sent,
            notification_sent_at: row.notification_sent_at,
            is_resolved: row.is_resolved,
            resolved_at: row.resolved_at,
        }
    }
}

pub struct NotificationStore {
    db: Db,
}

impl NotificationStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<AdminNotification>, Error> {
        let row: Option<NotificationRow> = sqlx::query_as("SELECT * FROM admin_notifications WHERE fingerprint = $1")
            .bind(fingerprint)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to look up notification by fingerprint", e))?;
        Ok(row.map(AdminNotification::from))
    }

    pub async fn insert(&self, notification: &AdminNotification) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO admin_notifications
                (id, fingerprint, error_type, service_name, error_message, first_occurrence,
                 last_occurrence, occurrence_count, notification_sent, notification_sent_at,
                 is_resolved, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(notification.id.as_str())
        .bind(&notification.fingerprint)
        .bind(&notification.error_type)
        .bind(&notification.service_name)
        .bind(&notification.error_message)
        .bind(notification.first_occurrence)
        .bind(notification.last_occurrence)
        .bind(notification.occurrence_count as i32)
        .bind(notification.notification_sent)
        .bind(notification.notification_sent_at)
        .bind(notification.is_resolved)
        .bind(notification.resolved_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to insert admin notification", e))?;
        Ok(())
    }

    /// Bumps `occurrence_count` and `last_occurrence` for a repeat error
    /// with the same fingerprint.
    pub async fn record_occurrence(&self, id: NotificationId, last_occurrence: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            "UPDATE admin_notifications
             SET occurrence_count = occurrence_count + 1, last_occurrence = $2
             WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(last_occurrence)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to record notification occurrence", e))?;
        Ok(())
    }

    pub async fn mark_sent(&self, id: NotificationId, sent_at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query("UPDATE admin_notifications SET notification_sent = TRUE, notification_sent_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(sent_at)
            .execute(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to mark notification sent", e))?;
        Ok(())
    }

    pub async fn mark_resolved(&self, id: NotificationId, resolved_at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query("UPDATE admin_notifications SET is_resolved = TRUE, resolved_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(resolved_at)
            .execute(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to mark notification resolved", e))?;
        Ok(())
    }

    /// Deletes resolved notifications older than `cutoff`, matching the
    /// source's periodic cleanup of the dedup table.
    pub async fn purge_resolved_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM admin_notifications WHERE is_resolved = TRUE AND last_occurrence < $1")
            .bind(cutoff)
            .execute(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to purge resolved notifications", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[path = "notifications_tests.rs"]
mod tests;
