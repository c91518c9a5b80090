// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Access-request workflow engine: CSV artefact writing (C1), request
//! classification and approval planning (C7), admin notification (C4),
//! audit recording (C8), and the task orchestrator that ties them together
//! (C6).

pub mod artefact;
pub mod audit;
pub mod notifier;
pub mod orchestrator;
pub mod state_machine;

pub use artefact::{ArtefactRow, ArtefactWriter};
pub use audit::AuditRecorder;
pub use notifier::Notifier;
pub use orchestrator::Orchestrator;
pub use state_machine::{classify, plan_change_approval, plan_new_approval, plan_revocation, ApprovalPlan, ClassificationInputs};
