// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Folder store: the permission-controlled resource tree (C2 backing).

use arw_core::{Error, Folder, FolderId, UserId};
use sqlx::FromRow;

use crate::db::{sqlx_err, Db};

#[derive(FromRow)]
struct FolderRow {
    id: String,
    path: String,
    name: String,
    description: Option<String>,
    active: bool,
    creator: String,
    owners: Vec<String>,
    validators: Vec<String>,
}

impl From<FolderRow> for Folder {
    fn from(row: FolderRow) -> Self {
        Folder {
            id: FolderId::from_string(row.id),
            path: row.path,
            name: row.name,
            description: row.description,
            active: row.active,
            creator: UserId::from_string(row.creator),
            owners: row.owners.into_iter().map(UserId::from_string).collect(),
            validators: row.validators.into_iter().map(UserId::from_string).collect(),
        }
    }
}

pub struct FolderStore {
    db: Db,
}

impl FolderStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn insert(&self, folder: &Folder) -> Result<(), Error> {
        let owners: Vec<String> = folder.owners.iter().map(|id| id.to_string()).collect();
        let validators: Vec<String> = folder.validators.iter().map(|id| id.to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO folders (id, path, name, description, active, creator, owners, validators)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(folder.id.as_str())
        .bind(&folder.path)
        .bind(&folder.name)
        .bind(&folder.description)
        .bind(folder.active)
        .bind(folder.creator.as_str())
        .bind(owners)
        .bind(validators)
        .execute(self.db.pool())
        .await
        .map_err(|e| sqlx_err("failed to insert folder", e))?;
        Ok(())
    }

    pub async fn get(&self, id: FolderId) -> Result<Folder, Error> {
        let row: FolderRow = sqlx::query_as("SELECT * FROM folders WHERE id = $1")
            .bind(id.as_str())
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to fetch folder", e))?;
        Ok(row.into())
    }

    pub async fn find_by_path(&self, path: &str) -> Result<Option<Folder>, Error> {
        let row: Option<FolderRow> = sqlx::query_as("SELECT * FROM folders WHERE path = $1")
            .bind(path)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to look up folder by path", e))?;
        Ok(row.map(Folder::from))
    }

    pub async fn set_owners(&self, id: FolderId, owners: &[UserId]) -> Result<(), Error> {
        let owners: Vec<String> = owners.iter().map(|u| u.to_string()).collect();
        sqlx::query("UPDATE folders SET owners = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(owners)
            .execute(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to update folder owners", e))?;
        Ok(())
    }

    pub async fn set_validators(&self, id: FolderId, validators: &[UserId]) -> Result<(), Error> {
        let validators: Vec<String> = validators.iter().map(|u| u.to_string()).collect();
        sqlx::query("UPDATE folders SET validators = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(validators)
            .execute(self.db.pool())
            .await
            .map_err(|e| sqlx_err("failed to update folder validators", e))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "folders_tests.rs"]
mod tests;
