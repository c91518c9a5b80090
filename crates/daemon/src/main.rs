// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access-request workflow daemon (arwd).
//!
//! Runs two independent loops against the same storage pool: the task
//! orchestrator's tick (C6, on `TASK_PROCESSING_INTERVAL`) and the four
//! catalogue sub-syncs (C9, each on its own configurable cadence). Neither
//! loop blocks the other; a slow directory during a sub-sync must never
//! delay task dispatch.

mod sync;

use std::sync::Arc;

use arw_adapters::{
    AuthMode, Delivery, DeliveryError, EmailDelivery, HttpWorkflowExecutor, LdapConfig,
    LdapDirectoryBackend, StdoutDelivery, WorkflowConfig,
};
use arw_core::config::{Config, SyncKindConfig};
use arw_engine::{ArtefactWriter, AuditRecorder, Notifier, Orchestrator};
use arw_storage::{AuditStore, Db, GroupStore, MembershipStore, NotificationStore, PermissionStore, RequestStore, TaskStore, UserStore};
use async_trait::async_trait;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// Chooses between SMTP and stdout delivery at startup, since `Delivery`
/// has no object-safe blanket impl to dispatch on dynamically.
enum AdminDelivery {
    Email(EmailDelivery),
    Stdout(StdoutDelivery),
}

#[async_trait]
impl Delivery for AdminDelivery {
    async fn send(&self, subject: &str, body: &str) -> Result<(), DeliveryError> {
        match self {
            AdminDelivery::Email(d) => d.send(subject, body).await,
            AdminDelivery::Stdout(d) => d.send(subject, body).await,
        }
    }
}

/// Airflow 2's REST API is basic-auth; Airflow 3's is bearer/JWT. A forced
/// version maps directly; `None` leaves auto-detection to the executor.
fn forced_auth_mode(forced_version: Option<&str>) -> Option<AuthMode> {
    match forced_version {
        Some("v2") => Some(AuthMode::Basic),
        Some("v3") => Some(AuthMode::Bearer),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::from_env();
    info!("starting access-request workflow daemon");

    let db = Db::connect(&config.database_url).await?;

    let tasks = TaskStore::new(db.clone());
    let requests = RequestStore::new(db.clone());
    let permissions = PermissionStore::new(db.clone());
    let groups = GroupStore::new(db.clone());
    let users = UserStore::new(db.clone());
    let memberships = MembershipStore::new(db.clone());
    let notifications = NotificationStore::new(db.clone());
    let audit = AuditRecorder::new(AuditStore::new(db.clone()));

    let http_client = reqwest::Client::builder()
        .danger_accept_invalid_certs(!config.airflow.verify_ssl)
        .build()?;
    let workflow = HttpWorkflowExecutor::new(
        http_client,
        WorkflowConfig {
            base_url: config.airflow.base_url.clone(),
            username: config.airflow.username.clone(),
            password: config.airflow.password.clone(),
            dag_id: config.airflow.dag_id.clone(),
            forced_auth_mode: forced_auth_mode(config.airflow.forced_version.as_deref()),
        },
    );

    let directory = Arc::new(LdapDirectoryBackend::new(LdapConfig {
        url: config.ldap.url.clone(),
        bind_dn: config.ldap.bind_dn.clone(),
        bind_password: config.ldap.bind_password.clone(),
        base_dn: config.ldap.base_dn.clone(),
        group_base_dn: config.ldap.group_base_dn.clone(),
        search_ous: config.ldap.search_ous.clone(),
        username_attr: config.ldap.username_attr.clone(),
        email_attr: config.ldap.email_attr.clone(),
        display_name_attr: config.ldap.display_name_attr.clone(),
    }));

    let delivery = match &config.notification.smtp_host {
        Some(host) => AdminDelivery::Email(EmailDelivery::new(
            host,
            config.notification.smtp_port,
            config.notification.smtp_username.as_deref(),
            config.notification.smtp_password.as_deref(),
            "arw-daemon@localhost",
            config.notification.admin_email.as_deref().unwrap_or("admin@localhost"),
        )?),
        None => AdminDelivery::Stdout(StdoutDelivery),
    };
    let notifier = Notifier::new(notifications, delivery, config.notification.cooldown_hours, config.notification.enabled);

    let artefacts = ArtefactWriter::new(config.csv_output_dir.clone(), config.ad_domain_prefix.clone());

    let orchestrator = Arc::new(Orchestrator::new(
        tasks, requests, permissions, groups.clone(), artefacts, workflow, directory.clone(), notifier, audit, config.task.clone(),
    ));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let tick_orchestrator = Arc::clone(&orchestrator);
    let tick_interval = config.task.processing_interval;
    let tick_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            interval.tick().await;
            if let Err(e) = tick_orchestrator.tick(chrono::Utc::now()).await {
                error!(error = %e, "orchestrator tick failed");
            }
        }
    });

    let sync_handles = spawn_sync_loops(directory, users, groups, memberships, &config.sync);

    info!("daemon ready");
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    tick_handle.abort();
    for handle in sync_handles {
        handle.abort();
    }
    Ok(())
}

fn spawn_sync_loops(
    directory: Arc<LdapDirectoryBackend>,
    users: UserStore,
    groups: GroupStore,
    memberships: MembershipStore,
    config: &arw_core::config::SyncConfig,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    handles.push(spawn_one("users", config.users.clone(), {
        let directory = Arc::clone(&directory);
        let users = users.clone();
        move || {
            let directory = Arc::clone(&directory);
            let users = users.clone();
            async move { sync::sync_users(directory.as_ref(), &users, chrono::Utc::now()).await }
        }
    }));

    handles.push(spawn_one("groups", config.groups.clone(), {
        let directory = Arc::clone(&directory);
        let groups = groups.clone();
        move || {
            let directory = Arc::clone(&directory);
            let groups = groups.clone();
            async move { sync::sync_groups(directory.as_ref(), &groups, chrono::Utc::now()).await }
        }
    }));

    handles.push(spawn_one("user_permissions", config.user_permissions.clone(), {
        let directory = Arc::clone(&directory);
        let users = users.clone();
        let groups = groups.clone();
        let memberships = memberships.clone();
        move || {
            let directory = Arc::clone(&directory);
            let users = users.clone();
            let groups = groups.clone();
            let memberships = memberships.clone();
            async move { sync::sync_user_permissions(directory.as_ref(), &users, &groups, &memberships, chrono::Utc::now()).await }
        }
    }));

    handles.push(spawn_one("active_memberships", config.active_memberships.clone(), {
        move || {
            let directory = Arc::clone(&directory);
            let users = users.clone();
            let groups = groups.clone();
            let memberships = memberships.clone();
            async move { sync::sync_active_memberships(directory.as_ref(), &users, &groups, &memberships, chrono::Utc::now()).await }
        }
    }));

    handles
}

fn spawn_one<F, Fut>(name: &'static str, kind: SyncKindConfig, make_pass: F) -> tokio::task::JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<(), arw_core::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if !kind.enabled {
            info!(sync = name, "sub-sync disabled, loop not started");
            return;
        }
        let mut interval = tokio::time::interval(kind.interval);
        loop {
            interval.tick().await;
            if let Err(e) = make_pass().await {
                warn!(sync = name, error = %e, "catalogue sub-sync pass failed");
            }
        }
    })
}
