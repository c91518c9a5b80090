// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error kind and error type used across every crate in the workspace.

use thiserror::Error;

/// Coarse classification of a failure, independent of which layer raised it.
///
/// The orchestrator's retry decision is a pure function of this kind
/// (see [`ErrorKind::is_retryable`]); nothing downstream inspects a
/// human-readable message to decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Entity lookup miss.
    NotFound,
    /// Authorisation refusal.
    Forbidden,
    /// Uniqueness or state-machine violation.
    Conflict,
    /// Network, deadlock, or token expiry; the caller should retry.
    Transient,
    /// Exhausted retries, malformed payload, or an impossible state.
    Permanent,
    /// The workflow executor reported terminal failure.
    ExternalFailed,
}

impl ErrorKind {
    /// Whether an operation that failed with this kind should be retried.
    ///
    /// Only `Transient` is retried by the orchestrator's own retry budget;
    /// `Permanent` and `ExternalFailed` are terminal once raised, since the
    /// layer that could have retried (token refresh, deadlock backoff)
    /// already exhausted its own attempts before converting to one of
    /// these kinds.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

crate::simple_display! {
    ErrorKind {
        NotFound => "not-found",
        Forbidden => "forbidden",
        Conflict => "conflict",
        Transient => "transient",
        Permanent => "permanent",
        ExternalFailed => "external-failed",
    }
}

/// The workspace's shared error type: a kind plus a message and an optional source.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { kind, message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn external_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalFailed, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
