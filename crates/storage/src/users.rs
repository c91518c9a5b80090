// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User catalogue store (C3 backing).

use arw_core::{Error, User, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::db::{sqlx_err, Db};

#[derive(FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    display_name: String,
    department: Option<String>,
    directory_dn: Option<String>,
    employee_id: Option<String>,
    active: bool,
    last_login: Option<DateTime<Utc>>,
    last_synced: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::from_string(row.id),
            username: row.username,
            email: row.email,
            display_name: row.display_name,
            department: row.department,
            directory_dn: row.directory_dn,
            employee_id: row.employee_id,
            active: row.active,
            last_login: row.last_login,
            last_synced: row.last_synced,
        }
    }
}

#[derive(Clone)]
pub struct UserStore {
    db: Db,
}

impl UserStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Inserts a new user, or updates the directory-sourced fields of an
    /// existing one matched by `id`, per the catalogue sync's upsert
    /// contract.
    pub async fn upsert(&self, user: &User) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO users
                (id, username, email, display_name, department, directory_dn,
                 employee_id, active, last_login, last_synced)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                username = EXCLUDED.username,
                email = EXCLUDED.email,
                display_name = EXCLUDED.display_name,
                department = EXCLUDED.department,
                directory_dn = EXCLUDED.directory_dn,
                employee_id = EXCLUDED.employee_id,
                active = EXCLUDED.active,
                last_synced = EXCLUDED.last_synced
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.department)
        .bind(&user.directory_dn)
        .bind(&user.employee_id)
        .bind(user.active)
        .bind(user.last_login)
        .bind(user.last_synced)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to upsert user", e))?;
        Ok(())
    }

    pub async fn get(&self, id: UserId) -> Result<User, Error> {
        let row: UserRow = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id.as_str())
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to fetch user", e))?;
        Ok(row.into())
    }

    /// Every active catalogue user, for the membership sub-syncs that walk
    /// the catalogue rather than the directory.
    pub async fn list_active(&self) -> Result<Vec<User>, Error> {
        let rows: Vec<UserRow> = sqlx::query_as("SELECT * FROM users WHERE active = TRUE")
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to list active users", e))?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    pub async fn find_by_directory_dn(&self, directory_dn: &str) -> Result<Option<User>, Error> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE directory_dn = $1")
            .bind(directory_dn)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to look up user by directory dn", e))?;
        Ok(row.map(User::from))
    }

    /// Every user not touched by the sync pass that started at `cutoff`
    /// is marked inactive rather than deleted, per the catalogue's
    /// soft-removal contract.
    pub async fn deactivate_unsynced_since(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE users SET active = FALSE WHERE active = TRUE AND (last_synced IS NULL OR last_synced < $1)",
        )
        .bind(cutoff)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to deactivate stale users", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[path = "users_tests.rs"]
mod tests;
