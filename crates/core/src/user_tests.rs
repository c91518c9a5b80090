// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn bare_username_strips_domain_prefix() {
    let user = User::builder().username("CORP\\alice").build();
    assert_eq!(user.bare_username(), "alice");
}

#[test]
fn bare_username_passes_through_without_prefix() {
    let user = User::builder().username("alice").build();
    assert_eq!(user.bare_username(), "alice");
}

#[test]
fn matricula_prefers_employee_id() {
    let user = User::builder().employee_id("E123").build();
    assert_eq!(user.matricula(), "E123");
}

#[test]
fn matricula_falls_back_to_user_id() {
    let user = User::builder().build();
    assert_eq!(user.matricula(), user.id.to_string());
}
