// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn only_transient_is_retryable() {
    assert!(ErrorKind::Transient.is_retryable());
    assert!(!ErrorKind::NotFound.is_retryable());
    assert!(!ErrorKind::Forbidden.is_retryable());
    assert!(!ErrorKind::Conflict.is_retryable());
    assert!(!ErrorKind::Permanent.is_retryable());
    assert!(!ErrorKind::ExternalFailed.is_retryable());
}

#[test]
fn display_formats_kind_and_message() {
    let err = Error::not_found("user alice");
    assert_eq!(err.to_string(), "not-found: user alice");
}

#[test]
fn with_source_preserves_chain() {
    let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
    let err = Error::with_source(ErrorKind::Transient, "write failed", io_err);
    assert!(std::error::Error::source(&err).is_some());
}
