// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catalogue group entity.

use chrono::{DateTime, Utc};

crate::define_id! {
    /// Identifies a catalogue group.
    pub struct GroupId("grp-");
}

/// A directory-backed group, mirrored into the local catalogue.
///
/// Lifecycle mirrors [`crate::User`]: created on sync, marked inactive
/// when no longer found in the directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub directory_dn: String,
    pub description: Option<String>,
    pub classification: Option<String>,
    pub active: bool,
    pub last_synced: Option<DateTime<Utc>>,
}

impl Group {
    pub fn new(name: impl Into<String>, directory_dn: impl Into<String>) -> Self {
        Self {
            id: GroupId::new(),
            name: name.into(),
            directory_dn: directory_dn.into(),
            description: None,
            classification: None,
            active: true,
            last_synced: None,
        }
    }

    /// Group name as written to the `ADGroup` CSV field, with the
    /// configured domain prefix applied if it is not already present.
    pub fn csv_name(&self, domain_prefix: Option<&str>) -> String {
        match domain_prefix {
            Some(prefix) if !self.name.starts_with(&format!("{prefix}\\")) => {
                format!("{prefix}\\{}", self.name)
            }
            _ => self.name.clone(),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct GroupBuilder => Group {
        into {
            name: String = "proj_X_R",
            directory_dn: String = "CN=proj_X_R,OU=Groups,DC=example,DC=com",
        }
        set {
            id: GroupId = GroupId::new(),
            active: bool = true,
        }
        option {
            description: String = None,
            classification: String = None,
            last_synced: DateTime<Utc> = None,
        }
    }
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
