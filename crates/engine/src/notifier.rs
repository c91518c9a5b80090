// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notifier (C4): fingerprint/dedup against [`arw_storage::NotificationStore`],
//! composing a templated message and handing it to an injected [`Delivery`].

use arw_adapters::Delivery;
use arw_core::{AdminNotification, Error};
use arw_storage::NotificationStore;
use chrono::{DateTime, Duration, Utc};
use handlebars::Handlebars;

const TEMPLATE: &str = "\
[{{error_type}}] {{service_name}} is failing

{{error_message}}

First seen: {{first_occurrence}}
Occurrences: {{occurrence_count}}
";

pub struct Notifier<D: Delivery> {
    store: NotificationStore,
    delivery: D,
    cooldown: Duration,
    enabled: bool,
}

impl<D: Delivery> Notifier<D> {
    pub fn new(store: NotificationStore, delivery: D, cooldown_hours: u32, enabled: bool) -> Self {
        Self { store, delivery, cooldown: Duration::hours(cooldown_hours.max(1) as i64), enabled }
    }

    /// Records an error occurrence and emits a notification if dedup/cooldown
    /// rules allow it. Never returns an error for a failed *send*: delivery
    /// failures are logged, since a broken notification channel must not
    /// itself block the orchestrator.
    pub async fn notify_error(&self, error_type: &str, service_name: &str, message: &str, now: DateTime<Utc>) -> Result<(), Error> {
        if !self.enabled {
            return Ok(());
        }
        let fingerprint = arw_core::fingerprint(error_type, service_name, message);
        let existing = self.store.find_by_fingerprint(&fingerprint).await?;

        let (notification, should_emit) = match existing {
            None => {
                let notification = AdminNotification::new(error_type, service_name, message, now);
                self.store.insert(&notification).await?;
                (notification, true)
            }
            Some(mut notification) => {
                self.store.record_occurrence(notification.id, now).await?;
                let should_emit = notification.should_emit(now, self.cooldown);
                notification.last_occurrence = now;
                (notification, should_emit)
            }
        };

        if !should_emit {
            return Ok(());
        }

        let body = render(&notification);
        let subject = format!("[{}] {}", notification.error_type, notification.service_name);
        if let Err(e) = self.delivery.send(&subject, &body).await {
            tracing::warn!(error = %e, "notification delivery failed");
            return Ok(());
        }
        self.store.mark_sent(notification.id, now).await?;
        Ok(())
    }

    pub async fn resolve(&self, error_type: &str, service_name: &str, message: &str, now: DateTime<Utc>) -> Result<(), Error> {
        let fingerprint = arw_core::fingerprint(error_type, service_name, message);
        if let Some(notification) = self.store.find_by_fingerprint(&fingerprint).await? {
            self.store.mark_resolved(notification.id, now).await?;
        }
        Ok(())
    }

    pub async fn purge_resolved_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        self.store.purge_resolved_older_than(cutoff).await
    }
}

fn render(notification: &AdminNotification) -> String {
    let handlebars = Handlebars::new();
    handlebars
        .render_template(
            TEMPLATE,
            &serde_json::json!({
                "error_type": notification.error_type,
                "service_name": notification.service_name,
                "error_message": notification.error_message,
                "first_occurrence": notification.first_occurrence.to_rfc3339(),
                "occurrence_count": notification.occurrence_count,
            }),
        )
        .unwrap_or_else(|_| notification.error_message.clone())
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
