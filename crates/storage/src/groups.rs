// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group catalogue store (C3 backing).

use arw_core::{Error, Group, GroupId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::db::{sqlx_err, Db};

#[derive(FromRow)]
struct GroupRow {
    id: String,
    name: String,
    directory_dn: String,
    description: Option<String>,
    classification: Option<String>,
    active: bool,
    last_synced: Option<DateTime<Utc>>,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: GroupId::from_string(row.id),
            name: row.name,
            directory_dn: row.directory_dn,
            description: row.description,
            classification: row.classification,
            active: row.active,
            last_synced: row.last_synced,
        }
    }
}

#[derive(Clone)]
pub struct GroupStore {
    db: Db,
}

impl GroupStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn upsert(&self, group: &Group) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO groups (id, name, directory_dn, description, classification, active, last_synced)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                directory_dn = EXCLUDED.directory_dn,
                description = EXCLUDED.description,
                classification = EXCLUDED.classification,
                active = EXCLUDED.active,
                last_synced = EXCLUDED.last_synced
            "#,
        )
        .bind(group.id.as_str())
        .bind(&group.name)
        .bind(&group.directory_dn)
        .bind(&group.description)
        .bind(&group.classification)
        .bind(group.active)
        .bind(group.last_synced)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to upsert group", e))?;
        Ok(())
    }

    pub async fn get(&self, id: GroupId) -> Result<Group, Error> {
        let row: GroupRow = sqlx::query_as("SELECT * FROM groups WHERE id = $1")
            .bind(id.as_str())
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to fetch group", e))?;
        Ok(row.into())
    }

    /// Every active catalogue group, for the membership sub-syncs that walk
    /// the catalogue rather than the directory.
    pub async fn list_active(&self) -> Result<Vec<Group>, Error> {
        let rows: Vec<GroupRow> = sqlx::query_as("SELECT * FROM groups WHERE active = TRUE")
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to list active groups", e))?;
        Ok(rows.into_iter().map(Group::from).collect())
    }

    pub async fn find_by_directory_dn(&self, directory_dn: &str) -> Result<Option<Group>, Error> {
        let row: Option<GroupRow> = sqlx::query_as("SELECT * FROM groups WHERE directory_dn = $1")
            .bind(directory_dn)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to look up group by directory dn", e))?;
        Ok(row.map(Group::from))
    }

    pub async fn deactivate_unsynced_since(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE groups SET active = FALSE WHERE active = TRUE AND (last_synced IS NULL OR last_synced < $1)",
        )
        .bind(cutoff)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to deactivate stale groups", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[path = "groups_tests.rs"]
mod tests;
