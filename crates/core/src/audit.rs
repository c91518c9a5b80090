// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit event entity.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::user::UserId;

crate::define_id! {
    /// Identifies an audit event.
    pub struct AuditEventId("aud-");
}

/// An immutable, append-only record of a state-changing action.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub actor: Option<UserId>,
    pub event_type: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub description: String,
    pub metadata: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        event_type: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEventId::new(),
            actor: None,
            event_type: event_type.into(),
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            description: description.into(),
            metadata: Value::Null,
            ip_address: None,
            user_agent: None,
            occurred_at: now,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct AuditEventBuilder => AuditEvent {
        into {
            event_type: String = "permission_request",
            action: String = "approve",
            resource_type: String = "permission_request",
            resource_id: String = "req-0",
            description: String = "approved",
        }
        set {
            id: AuditEventId = AuditEventId::new(),
            metadata: Value = Value::Null,
            occurred_at: DateTime<Utc> = Utc::now(),
        }
        option {
            actor: UserId = None,
            ip_address: String = None,
            user_agent: String = None,
        }
    }
}
