// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catalogue user entity.

use chrono::{DateTime, Utc};

crate::define_id! {
    /// Identifies a catalogue user.
    pub struct UserId("usr-");
}

/// A directory-backed user, mirrored into the local catalogue.
///
/// Created on first successful authentication or on demand during
/// membership resolution; marked inactive when a catalogue sync pass no
/// longer finds the user in the directory.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub department: Option<String>,
    pub directory_dn: Option<String>,
    /// Employee number ("matricula"); preferred over `id` on CSV artefacts.
    pub employee_id: Option<String>,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub last_synced: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            email: email.into(),
            display_name: display_name.into(),
            department: None,
            directory_dn: None,
            employee_id: None,
            active: true,
            last_login: None,
            last_synced: None,
        }
    }

    /// Bare principal name with any `DOMAIN\` prefix stripped, as written
    /// to the `UserName` field of a CSV artefact.
    pub fn bare_username(&self) -> &str {
        match self.username.split_once('\\') {
            Some((_, rest)) => rest,
            None => &self.username,
        }
    }

    /// Value written to the `MatriculaUsu` field: employee id if present,
    /// falling back to the catalogue user id.
    pub fn matricula(&self) -> String {
        self.employee_id.clone().unwrap_or_else(|| self.id.to_string())
    }

    crate::setters! {
        option {
            department: String,
            directory_dn: String,
            employee_id: String,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct UserBuilder => User {
        into {
            username: String = "alice",
            email: String = "alice@example.com",
            display_name: String = "Alice Example",
        }
        set {
            id: UserId = UserId::new(),
            active: bool = true,
        }
        option {
            department: String = None,
            directory_dn: String = None,
            employee_id: String = None,
            last_login: DateTime<Utc> = None,
            last_synced: DateTime<Utc> = None,
        }
    }
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;
