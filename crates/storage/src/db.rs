// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection pool and the deadlock-retry transaction helper shared by
//! every repository in this crate.

use std::future::Future;
use std::time::Duration;

use arw_core::{Error, ErrorKind};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

/// Postgres error code for a detected deadlock.
const DEADLOCK_DETECTED: &str = "40P01";

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| Error::with_source(ErrorKind::Transient, "failed to connect to database", e))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wraps an already-constructed pool, e.g. one handed to the process by
    /// a test harness.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run `body` inside a transaction, retrying on a detected deadlock
    /// with exponential backoff (0.1s × 2^n) for up to `attempts` tries
    /// (default 3) before surfacing the error, per §4.5.
    pub async fn with_retry<'a, F, Fut, T>(&'a self, attempts: u32, mut body: F) -> Result<T, Error>
    where
        F: FnMut(&mut Transaction<'static, Postgres>) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0;
        loop {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| Error::with_source(ErrorKind::Transient, "failed to begin transaction", e))?;

            match body(&mut tx).await {
                Ok(value) => {
                    tx.commit()
                        .await
                        .map_err(|e| Error::with_source(ErrorKind::Transient, "failed to commit", e))?;
                    return Ok(value);
                }
                Err(err) if is_deadlock(&err) && attempt + 1 < attempts => {
                    let _ = tx.rollback().await;
                    let backoff = Duration::from_millis(100) * 2u32.pow(attempt);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    let _ = tx.rollback().await;
                    return Err(err);
                }
            }
        }
    }
}

fn is_deadlock(err: &Error) -> bool {
    err.source
        .as_ref()
        .and_then(|s| s.downcast_ref::<sqlx::Error>())
        .and_then(|e| e.as_database_error())
        .and_then(|db_err| db_err.code())
        .map(|code| code == DEADLOCK_DETECTED)
        .unwrap_or(false)
}

pub(crate) fn sqlx_err(context: &str, e: sqlx::Error) -> Error {
    let kind = match &e {
        sqlx::Error::RowNotFound => ErrorKind::NotFound,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(DEADLOCK_DETECTED) => ErrorKind::Transient,
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => ErrorKind::Conflict,
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => ErrorKind::Transient,
        _ => ErrorKind::Permanent,
    };
    Error::with_source(kind, context, e)
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
