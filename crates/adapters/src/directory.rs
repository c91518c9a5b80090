// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-service backend (C3): group/user lookups against an LDAP
//! catalogue. Membership derived from `user_groups` is decision-authoritative
//! for verification and must never be answered from the local catalogue.

use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use thiserror::Error;

/// Page size for the `PagedResults` control (OID `1.2.840.113556.1.4.319`),
/// fixed at the value the source hardcodes.
const PAGE_SIZE: i32 = 1000;

/// `userAccountControl` bit that marks an account disabled.
const UAC_ACCOUNTDISABLE: i64 = 0x0002;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory connection failed: {0}")]
    Connect(String),
    #[error("directory search failed: {0}")]
    Search(String),
    #[error("directory bind failed: {0}")]
    Bind(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub dn: String,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub name: String,
    pub dn: String,
}

#[async_trait]
pub trait DirectoryBackend: Send + Sync + 'static {
    async fn group_exists(&self, name: &str) -> Result<bool, DirectoryError>;
    async fn group_members(&self, group_dn: &str) -> Result<Vec<String>, DirectoryError>;
    async fn user_details(&self, username: &str) -> Result<Option<UserRecord>, DirectoryError>;
    async fn user_groups(&self, username: &str) -> Result<Vec<String>, DirectoryError>;
    /// Full group listing under the configured group base, for the
    /// catalogue sub-sync's `groups` pass.
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, DirectoryError>;
    /// Full user listing across the configured search bases, for the
    /// catalogue sub-sync's `users` pass.
    async fn list_users(&self) -> Result<Vec<UserRecord>, DirectoryError>;
}

/// Escapes a value for safe interpolation into an RFC 4515 filter, per the
/// injection defence the directory client must apply to every operand it
/// receives from request data.
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[derive(Debug, Clone)]
pub struct LdapConfig {
    pub url: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub base_dn: String,
    pub group_base_dn: String,
    /// Subtree DNs searched for users, in order; falls back to `base_dn`
    /// alone when empty.
    pub search_ous: Vec<String>,
    pub username_attr: String,
    pub email_attr: String,
    pub display_name_attr: String,
}

pub struct LdapDirectoryBackend {
    config: LdapConfig,
}

impl LdapDirectoryBackend {
    pub fn new(config: LdapConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<ldap3::Ldap, DirectoryError> {
        let (conn, mut ldap) = LdapConnAsync::with_settings(LdapConnSettings::new(), &self.config.url)
            .await
            .map_err(|e| DirectoryError::Connect(e.to_string()))?;
        ldap3::drive!(conn);
        ldap.simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| DirectoryError::Bind(e.to_string()))?
            .success()
            .map_err(|e| DirectoryError::Bind(e.to_string()))?;
        Ok(ldap)
    }

    fn search_bases(&self) -> Vec<String> {
        if self.config.search_ous.is_empty() {
            vec![self.config.base_dn.clone()]
        } else {
            self.config.search_ous.clone()
        }
    }

    /// Paged search across every configured base, stopping at the first
    /// base that yields a match. The paging control mirrors the OID and
    /// page size the directory requires for large result sets.
    async fn paged_search(
        &self,
        ldap: &mut ldap3::Ldap,
        base: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<SearchEntry>, DirectoryError> {
        use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
        use ldap3::LdapResult;

        let adapters: Vec<Box<dyn Adapter<_, _>>> =
            vec![Box::new(EntriesOnly::new()), Box::new(PagedResults::new(PAGE_SIZE))];
        let mut search = ldap
            .streaming_search_with(adapters, base, Scope::Subtree, filter, attrs)
            .await
            .map_err(|e| DirectoryError::Search(e.to_string()))?;

        let mut entries = Vec::new();
        while let Some(entry) = search.next().await.map_err(|e| DirectoryError::Search(e.to_string()))? {
            entries.push(SearchEntry::construct(entry));
        }
        let _: LdapResult = search.finish().await;
        Ok(entries)
    }
}

#[async_trait]
impl DirectoryBackend for LdapDirectoryBackend {
    async fn group_exists(&self, name: &str) -> Result<bool, DirectoryError> {
        let mut ldap = self.connect().await?;
        let filter = format!("(cn={})", escape_filter_value(name));
        let entries = self.paged_search(&mut ldap, &self.config.group_base_dn, &filter, &["cn"]).await?;
        let _ = ldap.unbind().await;
        Ok(!entries.is_empty())
    }

    async fn group_members(&self, group_dn: &str) -> Result<Vec<String>, DirectoryError> {
        let mut ldap = self.connect().await?;
        let filter = format!("(memberOf={})", escape_filter_value(group_dn));
        let entries = self.paged_search(&mut ldap, &self.config.base_dn, &filter, &["distinguishedName"]).await?;
        let _ = ldap.unbind().await;
        Ok(entries.into_iter().map(|e| e.dn).collect())
    }

    async fn user_details(&self, username: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let mut ldap = self.connect().await?;
        let filter = format!("({}={})", self.config.username_attr, escape_filter_value(username));
        let attrs = [
            self.config.username_attr.as_str(),
            self.config.email_attr.as_str(),
            self.config.display_name_attr.as_str(),
            "userAccountControl",
        ];
        let mut found = None;
        for base in self.search_bases() {
            let entries = self.paged_search(&mut ldap, &base, &filter, &attrs).await?;
            if let Some(entry) = entries.into_iter().next() {
                found = Some(entry);
                break;
            }
        }
        let _ = ldap.unbind().await;

        let Some(entry) = found else {
            return Ok(None);
        };
        let attr = |name: &str| entry.attrs.get(name).and_then(|v| v.first()).cloned().unwrap_or_default();
        let uac: i64 = entry
            .attrs
            .get("userAccountControl")
            .and_then(|v| v.first())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Ok(Some(UserRecord {
            username: attr(&self.config.username_attr),
            email: attr(&self.config.email_attr),
            display_name: attr(&self.config.display_name_attr),
            dn: entry.dn,
            disabled: uac & UAC_ACCOUNTDISABLE != 0,
        }))
    }

    async fn user_groups(&self, username: &str) -> Result<Vec<String>, DirectoryError> {
        let mut ldap = self.connect().await?;
        let filter = format!("({}={})", self.config.username_attr, escape_filter_value(username));
        let mut groups = Vec::new();
        for base in self.search_bases() {
            let entries = self.paged_search(&mut ldap, &base, &filter, &["memberOf"]).await?;
            if let Some(entry) = entries.into_iter().next() {
                groups = entry.attrs.get("memberOf").cloned().unwrap_or_default();
                break;
            }
        }
        let _ = ldap.unbind().await;
        Ok(groups)
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, DirectoryError> {
        let mut ldap = self.connect().await?;
        let entries = self.paged_search(&mut ldap, &self.config.group_base_dn, "(objectClass=group)", &["cn"]).await?;
        let _ = ldap.unbind().await;
        Ok(entries
            .into_iter()
            .map(|e| GroupRecord { name: e.attrs.get("cn").and_then(|v| v.first()).cloned().unwrap_or_default(), dn: e.dn })
            .collect())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        let mut ldap = self.connect().await?;
        let attrs = [
            self.config.username_attr.as_str(),
            self.config.email_attr.as_str(),
            self.config.display_name_attr.as_str(),
            "userAccountControl",
        ];
        let mut records = Vec::new();
        for base in self.search_bases() {
            let entries = self.paged_search(&mut ldap, &base, "(objectClass=user)", &attrs).await?;
            for entry in entries {
                let attr = |name: &str| entry.attrs.get(name).and_then(|v| v.first()).cloned().unwrap_or_default();
                let uac: i64 =
                    entry.attrs.get("userAccountControl").and_then(|v| v.first()).and_then(|v| v.parse().ok()).unwrap_or(0);
                records.push(UserRecord {
                    username: attr(&self.config.username_attr),
                    email: attr(&self.config.email_attr),
                    display_name: attr(&self.config.display_name_attr),
                    dn: entry.dn,
                    disabled: uac & UAC_ACCOUNTDISABLE != 0,
                });
            }
        }
        let _ = ldap.unbind().await;
        Ok(records)
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{DirectoryBackend, DirectoryError, GroupRecord, UserRecord};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct State {
        groups: HashMap<String, Vec<String>>,
        users: HashMap<String, UserRecord>,
        user_groups: HashMap<String, Vec<String>>,
        group_listing: Vec<GroupRecord>,
        user_listing: Vec<UserRecord>,
    }

    /// In-memory stand-in keyed by group name / username, for tests that
    /// exercise orchestration logic without a real directory.
    #[derive(Clone, Default)]
    pub struct FakeDirectoryBackend {
        state: Arc<Mutex<State>>,
    }

    impl FakeDirectoryBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_group(&self, name: &str, members: Vec<String>) {
            self.state.lock().groups.insert(name.to_string(), members);
        }

        pub fn add_user(&self, user: UserRecord) {
            self.state.lock().users.insert(user.username.clone(), user);
        }

        pub fn set_user_groups(&self, username: &str, groups: Vec<String>) {
            self.state.lock().user_groups.insert(username.to_string(), groups);
        }

        pub fn set_group_listing(&self, groups: Vec<GroupRecord>) {
            self.state.lock().group_listing = groups;
        }

        pub fn set_user_listing(&self, users: Vec<UserRecord>) {
            self.state.lock().user_listing = users;
        }
    }

    #[async_trait]
    impl DirectoryBackend for FakeDirectoryBackend {
        async fn group_exists(&self, name: &str) -> Result<bool, DirectoryError> {
            Ok(self.state.lock().groups.contains_key(name))
        }

        async fn group_members(&self, group_dn: &str) -> Result<Vec<String>, DirectoryError> {
            Ok(self.state.lock().groups.get(group_dn).cloned().unwrap_or_default())
        }

        async fn user_details(&self, username: &str) -> Result<Option<UserRecord>, DirectoryError> {
            Ok(self.state.lock().users.get(username).cloned())
        }

        async fn user_groups(&self, username: &str) -> Result<Vec<String>, DirectoryError> {
            Ok(self.state.lock().user_groups.get(username).cloned().unwrap_or_default())
        }

        async fn list_groups(&self) -> Result<Vec<GroupRecord>, DirectoryError> {
            Ok(self.state.lock().group_listing.clone())
        }

        async fn list_users(&self) -> Result<Vec<UserRecord>, DirectoryError> {
            Ok(self.state.lock().user_listing.clone())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeDirectoryBackend;

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
