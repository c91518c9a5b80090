// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit recorder (C8): thin convenience wrapper over [`arw_storage::AuditStore`]
//! for the event shapes the engine emits.

use arw_core::{AuditEvent, Error, UserId};
use arw_storage::AuditStore;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub struct AuditRecorder {
    store: AuditStore,
}

impl AuditRecorder {
    pub fn new(store: AuditStore) -> Self {
        Self { store }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        actor: Option<UserId>,
        event_type: &str,
        action: &str,
        resource_type: &str,
        resource_id: &str,
        description: &str,
        metadata: Value,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut event = AuditEvent::new(event_type, action, resource_type, resource_id, description, now);
        event.actor = actor;
        event.metadata = metadata;
        self.store.record(&event).await
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
