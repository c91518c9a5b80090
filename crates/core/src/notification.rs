// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin notification: the dedup/cooldown table backing C4.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

crate::define_id! {
    /// Identifies an admin notification dedup row.
    pub struct NotificationId("ntf-");
}

/// Fingerprint = SHA-256(error-type `:` service-name `:` message[:500]),
/// matching the source's deduplication key exactly.
pub fn fingerprint(error_type: &str, service_name: &str, message: &str) -> String {
    let truncated: String = message.chars().take(500).collect();
    let input = format!("{error_type}:{service_name}:{truncated}");
    let digest = Sha256::digest(input.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// The dedup/cooldown record for one distinct (error_type, service_name,
/// message-prefix) fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminNotification {
    pub id: NotificationId,
    pub fingerprint: String,
    pub error_type: String,
    pub service_name: String,
    pub error_message: String,
    pub first_occurrence: DateTime<Utc>,
    pub last_occurrence: DateTime<Utc>,
    pub occurrence_count: u32,
    pub notification_sent: bool,
    pub notification_sent_at: Option<DateTime<Utc>>,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AdminNotification {
    pub fn new(error_type: impl Into<String>, service_name: impl Into<String>, error_message: impl Into<String>, now: DateTime<Utc>) -> Self {
        let error_type = error_type.into();
        let service_name = service_name.into();
        let error_message = error_message.into();
        let fingerprint = fingerprint(&error_type, &service_name, &error_message);
        Self {
            id: NotificationId::new(),
            fingerprint,
            error_type,
            service_name,
            error_message,
            first_occurrence: now,
            last_occurrence: now,
            occurrence_count: 1,
            notification_sent: false,
            notification_sent_at: None,
            is_resolved: false,
            resolved_at: None,
        }
    }

    /// Whether a new occurrence at `now` should emit, given a cooldown
    /// window. Mirrors the three-way branch of the source's
    /// `should_notify`: never resolved; and (never sent, or cooldown
    /// elapsed since the last send).
    pub fn should_emit(&self, now: DateTime<Utc>, cooldown: chrono::Duration) -> bool {
        if self.is_resolved {
            return false;
        }
        if !self.notification_sent {
            return true;
        }
        match self.notification_sent_at {
            None => true,
            Some(sent_at) => sent_at + cooldown <= now,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct AdminNotificationBuilder => AdminNotification {
        into {
            error_type: String = "airflow",
            service_name: String = "workflow-executor",
            error_message: String = "connection refused",
        }
        set {
            id: NotificationId = NotificationId::new(),
            fingerprint: String = String::new(),
            first_occurrence: DateTime<Utc> = Utc::now(),
            last_occurrence: DateTime<Utc> = Utc::now(),
            occurrence_count: u32 = 1,
            notification_sent: bool = false,
            is_resolved: bool = false,
        }
        option {
            notification_sent_at: DateTime<Utc> = None,
            resolved_at: DateTime<Utc> = None,
        }
    }
}

#[cfg(test)]
#[path = "notification_tests.rs"]
mod tests;
