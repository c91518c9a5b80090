// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observed (user, group) membership, mirrored from the directory.

use chrono::{DateTime, Utc};

use crate::group::GroupId;
use crate::user::UserId;

crate::define_id! {
    /// Identifies a catalogue membership row.
    pub struct MembershipId("mem-");
}

/// A (user, group) pair as last observed in the directory.
///
/// This reflects directory state at last observation; it is never the
/// source of truth for a verification decision (see [`crate`] module docs
/// on C3's directory-authoritative verification).
#[derive(Debug, Clone, PartialEq)]
pub struct UserGroupMembership {
    pub id: MembershipId,
    pub user_id: UserId,
    pub group_id: GroupId,
    pub active: bool,
    pub grantor: Option<UserId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserGroupMembership {
    pub fn new(user_id: UserId, group_id: GroupId, now: DateTime<Utc>) -> Self {
        Self {
            id: MembershipId::new(),
            user_id,
            group_id,
            active: true,
            grantor: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct UserGroupMembershipBuilder => UserGroupMembership {
        set {
            id: MembershipId = MembershipId::new(),
            user_id: UserId = UserId::new(),
            group_id: GroupId = GroupId::new(),
            active: bool = true,
            created_at: DateTime<Utc> = Utc::now(),
            updated_at: DateTime<Utc> = Utc::now(),
        }
        option {
            grantor: UserId = None,
            notes: String = None,
        }
    }
}
