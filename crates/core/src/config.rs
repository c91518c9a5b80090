// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access, assembled once into a [`Config`]
//! at process start. Nothing downstream re-reads the environment per request.

use std::time::Duration;

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|s| !s.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_opt_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

/// Workflow-executor (C2) configuration.
#[derive(Debug, Clone)]
pub struct AirflowConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub dag_id: String,
    pub verify_ssl: bool,
    /// `Some("v2")` / `Some("v3")` forces a variant; `None` autodetects.
    pub forced_version: Option<String>,
}

/// Directory-backend (C3) configuration.
#[derive(Debug, Clone)]
pub struct LdapConfig {
    pub url: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub base_dn: String,
    pub group_base_dn: String,
    /// Additional subtree DNs to search, beyond `base_dn`.
    pub search_ous: Vec<String>,
    pub admin_groups: Vec<String>,
    /// Directory attribute that holds the sign-in username.
    pub username_attr: String,
    /// Directory attribute that holds the e-mail address.
    pub email_attr: String,
    /// Directory attribute that holds the human-readable display name.
    pub display_name_attr: String,
}

/// Notifier (C4) configuration.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub admin_email: Option<String>,
    pub enabled: bool,
    pub cooldown_hours: u32,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
}

/// Task orchestrator (C6) and fast-path (§4.6) timing configuration.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub processing_interval: Duration,
    pub batch_size: u32,
    pub cleanup_days: u32,
    pub immediate_airflow_timeout: Duration,
    pub immediate_airflow_poll_interval: Duration,
    pub immediate_verification_timeout: Duration,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(300),
            processing_interval: Duration::from_secs(300),
            batch_size: 10,
            cleanup_days: 30,
            immediate_airflow_timeout: Duration::from_secs(300),
            immediate_airflow_poll_interval: Duration::from_secs(10),
            immediate_verification_timeout: Duration::from_secs(60),
        }
    }
}

/// Periodic catalogue sub-sync (C9) cadence for one of the four sync kinds.
#[derive(Debug, Clone)]
pub struct SyncKindConfig {
    pub enabled: bool,
    pub interval: Duration,
}

/// Periodic driver (C9) configuration: one cadence per sub-sync kind.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub users: SyncKindConfig,
    pub groups: SyncKindConfig,
    pub user_permissions: SyncKindConfig,
    pub active_memberships: SyncKindConfig,
}

/// The full process configuration, assembled once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub csv_output_dir: String,
    pub ad_domain_prefix: Option<String>,
    pub airflow: AirflowConfig,
    pub ldap: LdapConfig,
    pub notification: NotificationConfig,
    pub task: TaskConfig,
    pub sync: SyncConfig,
}

impl Config {
    /// Read the full configuration from the process environment.
    pub fn from_env() -> Self {
        let sync_kind = |prefix: &str, default_secs: u64| SyncKindConfig {
            enabled: env_bool(&format!("SYNC_{prefix}_ENABLED"), true),
            interval: Duration::from_secs(env_u64(&format!("SYNC_{prefix}_INTERVAL"), default_secs)),
        };

        Self {
            database_url: env_string("DATABASE_URL", "postgres://localhost/arw"),
            csv_output_dir: env_string("CSV_OUTPUT_DIR", "/tmp/arw_csv_files"),
            ad_domain_prefix: env_opt_string("AD_DOMAIN_PREFIX"),
            airflow: AirflowConfig {
                base_url: env_string("AIRFLOW_BASE_URL", "http://localhost:8080"),
                username: env_string("AIRFLOW_USERNAME", "airflow"),
                password: env_string("AIRFLOW_PASSWORD", ""),
                dag_id: env_string("AIRFLOW_DAG_ID", "permission_change"),
                verify_ssl: env_bool("AIRFLOW_VERIFY_SSL", true),
                forced_version: env_opt_string("AIRFLOW_FORCE_VERSION"),
            },
            ldap: LdapConfig {
                url: env_string("LDAP_URL", "ldap://localhost:389"),
                bind_dn: env_string("LDAP_BIND_DN", ""),
                bind_password: env_string("LDAP_BIND_PASSWORD", ""),
                base_dn: env_string("LDAP_BASE_DN", ""),
                group_base_dn: env_string("LDAP_GROUP_BASE_DN", ""),
                search_ous: env_opt_string("LDAP_SEARCH_OUS")
                    .map(|s| s.split(',').map(|v| v.trim().to_string()).collect())
                    .unwrap_or_default(),
                admin_groups: env_opt_string("LDAP_ADMIN_GROUPS")
                    .map(|s| s.split(',').map(|v| v.trim().to_string()).collect())
                    .unwrap_or_default(),
                username_attr: env_string("LDAP_USERNAME_ATTR", "sAMAccountName"),
                email_attr: env_string("LDAP_EMAIL_ATTR", "mail"),
                display_name_attr: env_string("LDAP_DISPLAY_NAME_ATTR", "displayName"),
            },
            notification: NotificationConfig {
                admin_email: env_opt_string("ADMIN_EMAIL"),
                enabled: env_bool("ADMIN_NOTIFICATION_ENABLED", true),
                cooldown_hours: env_u32("ADMIN_NOTIFICATION_COOLDOWN_HOURS", 24),
                smtp_host: env_opt_string("SMTP_HOST"),
                smtp_port: env_u32("SMTP_PORT", 25) as u16,
                smtp_username: env_opt_string("SMTP_USERNAME"),
                smtp_password: env_opt_string("SMTP_PASSWORD"),
            },
            task: TaskConfig {
                max_retries: env_u32("TASK_MAX_RETRIES", 3),
                retry_delay: Duration::from_secs(env_u64("TASK_RETRY_DELAY", 300)),
                processing_interval: Duration::from_secs(env_u64("TASK_PROCESSING_INTERVAL", 300)),
                batch_size: env_u32("TASK_BATCH_SIZE", 10),
                cleanup_days: env_u32("TASK_CLEANUP_DAYS", 30),
                immediate_airflow_timeout: Duration::from_secs(env_u64(
                    "IMMEDIATE_AIRFLOW_TIMEOUT",
                    300,
                )),
                immediate_airflow_poll_interval: Duration::from_secs(env_u64(
                    "IMMEDIATE_AIRFLOW_RETRY_DELAY",
                    10,
                )),
                immediate_verification_timeout: Duration::from_secs(env_u64(
                    "IMMEDIATE_VERIFICATION_TIMEOUT",
                    60,
                )),
            },
            sync: SyncConfig {
                users: sync_kind("USERS", 3600),
                groups: sync_kind("GROUPS", 3600),
                user_permissions: sync_kind("USER_PERMISSIONS", 1800),
                active_memberships: sync_kind("ACTIVE_MEMBERSHIPS", 1800),
            },
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
