// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn row_not_found_maps_to_not_found_kind() {
    let err = sqlx_err("lookup", sqlx::Error::RowNotFound);
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[test]
fn pool_timeout_maps_to_transient_kind() {
    let err = sqlx_err("acquire", sqlx::Error::PoolTimedOut);
    assert_eq!(err.kind, ErrorKind::Transient);
}
