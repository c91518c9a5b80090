// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification delivery (C4's outbound leg): the notifier composes a
//! templated message and hands it to one of these; which one is injected
//! at construction time.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

#[async_trait]
pub trait Delivery: Send + Sync + 'static {
    async fn send(&self, subject: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Sends over SMTP via `lettre`, to the single configured admin address.
pub struct EmailDelivery {
    transport: lettre::AsyncSmtpTransport<lettre::Tokio1Executor>,
    from: lettre::message::Mailbox,
    to: lettre::message::Mailbox,
}

impl EmailDelivery {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        smtp_username: Option<&str>,
        smtp_password: Option<&str>,
        from: &str,
        to: &str,
    ) -> Result<Self, DeliveryError> {
        let mut builder = lettre::AsyncSmtpTransport::<lettre::Tokio1Executor>::builder_dangerous(smtp_host)
            .port(smtp_port);
        if let (Some(user), Some(pass)) = (smtp_username, smtp_password) {
            builder = builder.credentials(lettre::transport::smtp::authentication::Credentials::new(
                user.to_string(),
                pass.to_string(),
            ));
        }
        let from = from.parse().map_err(|e| DeliveryError::SendFailed(format!("invalid from address: {e}")))?;
        let to = to.parse().map_err(|e| DeliveryError::SendFailed(format!("invalid to address: {e}")))?;
        Ok(Self { transport: builder.build(), from, to })
    }
}

#[async_trait]
impl Delivery for EmailDelivery {
    async fn send(&self, subject: &str, body: &str) -> Result<(), DeliveryError> {
        use lettre::AsyncTransport;
        let message = lettre::Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| DeliveryError::SendFailed(e.to_string()))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::SendFailed(e.to_string()))?;
        Ok(())
    }
}

/// Writes to stdout via `tracing`; the fallback when no SMTP config is
/// present, matching the source's degrade-to-log behaviour.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutDelivery;

#[async_trait]
impl Delivery for StdoutDelivery {
    async fn send(&self, subject: &str, body: &str) -> Result<(), DeliveryError> {
        tracing::warn!(%subject, %body, "admin notification");
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{Delivery, DeliveryError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    pub struct DeliveryCall {
        pub subject: String,
        pub body: String,
    }

    #[derive(Clone, Default)]
    pub struct FakeDelivery {
        calls: Arc<Mutex<Vec<DeliveryCall>>>,
    }

    impl FakeDelivery {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<DeliveryCall> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Delivery for FakeDelivery {
        async fn send(&self, subject: &str, body: &str) -> Result<(), DeliveryError> {
            self.calls.lock().push(DeliveryCall { subject: subject.to_string(), body: body.to_string() });
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{DeliveryCall, FakeDelivery};

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
