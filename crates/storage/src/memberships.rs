// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observed (user, group) membership store (C3 backing).

use arw_core::{Error, GroupId, MembershipId, UserGroupMembership, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::db::{sqlx_err, Db};

#[derive(FromRow)]
struct MembershipRow {
    id: String,
    user_id: String,
    group_id: String,
    active: bool,
    grantor: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MembershipRow> for UserGroupMembership {
    fn from(row: MembershipRow) -> Self {
        UserGroupMembership {
            id: MembershipId::from_string(row.id),
            user_id: UserId::from_string(row.user_id),
            group_id: GroupId::from_string(row.group_id),
            active: row.active,
            grantor: row.grantor.map(UserId::from_string),
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct MembershipStore {
    db: Db,
}

impl MembershipStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn upsert(&self, membership: &UserGroupMembership) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO user_group_memberships
                (id, user_id, group_id, active, grantor, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, group_id) DO UPDATE SET
                active = EXCLUDED.active,
                grantor = EXCLUDED.grantor,
                notes = EXCLUDED.notes,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(membership.id.as_str())
        .bind(membership.user_id.as_str())
        .bind(membership.group_id.as_str())
        .bind(membership.active)
        .bind(membership.grantor.map(|id| id.to_string()))
        .bind(&membership.notes)
        .bind(membership.created_at)
        .bind(membership.updated_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to upsert membership", e))?;
        Ok(())
    }

    pub async fn find(&self, user_id: UserId, group_id: GroupId) -> Result<Option<UserGroupMembership>, Error> {
        let row: Option<MembershipRow> =
            sqlx::query_as("SELECT * FROM user_group_memberships WHERE user_id = $1 AND group_id = $2")
                .bind(user_id.as_str())
                .bind(group_id.as_str())
                .fetch_optional(self.db.pool())
                .await
                .map_err(|e| sqlx_err("failed to look up membership", e))?;
        Ok(row.map(UserGroupMembership::from))
    }

    /// Whether `user_id` currently holds an active membership in `group_id`,
    /// as last observed from the directory. This is the directory-authoritative
    /// check behind verification.
    pub async fn is_active_member(&self, user_id: UserId, group_id: GroupId) -> Result<bool, Error> {
        Ok(self.find(user_id, group_id).await?.map(|m| m.active).unwrap_or(false))
    }

    pub async fn deactivate(&self, user_id: UserId, group_id: GroupId, updated_at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            "UPDATE user_group_memberships SET active = FALSE, updated_at = $3 WHERE user_id = $1 AND group_id = $2",
        )
        .bind(user_id.as_str())
        .bind(group_id.as_str())
        .bind(updated_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to deactivate membership", e))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "memberships_tests.rs"]
mod tests;
