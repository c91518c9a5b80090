// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow-executor client (C2): submits and polls runs against either of
//! two protocol generations, auto-detected from the configured base URL.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Outcome of a run, as reported by `getRun`. Anything the executor reports
/// that does not match a known terminal/non-terminal keyword is logged and
/// treated as non-terminal rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Success,
    Failed,
    Cancelled,
    Skipped,
    Running,
    Queued,
    Unknown(String),
}

impl RunState {
    pub fn from_wire(state: &str) -> Self {
        match state {
            "success" => Self::Success,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "skipped" => Self::Skipped,
            "running" => Self::Running,
            "queued" => Self::Queued,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled | Self::Skipped)
    }
}

#[async_trait]
pub trait WorkflowExecutor: Send + Sync + 'static {
    async fn submit_run(&self, run_id: &str, conf: serde_json::Value) -> Result<String, WorkflowError>;
    async fn get_run(&self, run_id: &str) -> Result<RunState, WorkflowError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Basic,
    Bearer,
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub dag_id: String,
    /// Bypasses auto-detection when set, per the configuration escape hatch.
    pub forced_auth_mode: Option<AuthMode>,
}

struct CachedToken {
    access_token: String,
    issued_at: DateTime<Utc>,
}

const TOKEN_LIFETIME_MINUTES: i64 = 60;
const TOKEN_SAFETY_MARGIN_MINUTES: i64 = 5;

pub struct HttpWorkflowExecutor {
    client: reqwest::Client,
    config: WorkflowConfig,
    auth_mode: Mutex<Option<AuthMode>>,
    token: Mutex<Option<CachedToken>>,
}

impl HttpWorkflowExecutor {
    pub fn new(client: reqwest::Client, config: WorkflowConfig) -> Self {
        let auth_mode = config.forced_auth_mode;
        Self { client, config, auth_mode: Mutex::new(auth_mode), token: Mutex::new(None) }
    }

    async fn resolve_auth_mode(&self) -> Result<AuthMode, WorkflowError> {
        if let Some(mode) = *self.auth_mode.lock().await {
            return Ok(mode);
        }
        let mode = if self.config.base_url.contains("/api/v1") {
            AuthMode::Basic
        } else {
            let url = format!("{}/api/v2/version", self.config.base_url.trim_end_matches('/'));
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| WorkflowError::Request(e.to_string()))?;
            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| WorkflowError::UnexpectedResponse(e.to_string()))?;
            let version = body.get("version").and_then(|v| v.as_str()).unwrap_or_default();
            if version.starts_with("3.") {
                AuthMode::Bearer
            } else {
                AuthMode::Basic
            }
        };
        *self.auth_mode.lock().await = Some(mode);
        Ok(mode)
    }

    async fn fetch_token(&self) -> Result<String, WorkflowError> {
        let url = format!("{}/auth/token", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await
            .map_err(|e| WorkflowError::Auth(e.to_string()))?;
        if !response.status().is_success() {
            return Err(WorkflowError::Auth(format!("token endpoint returned {}", response.status())));
        }
        let body: serde_json::Value =
            response.json().await.map_err(|e| WorkflowError::UnexpectedResponse(e.to_string()))?;
        body.get("access_token")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| WorkflowError::UnexpectedResponse("missing access_token".to_string()))
    }

    async fn bearer_token(&self, force_refresh: bool) -> Result<String, WorkflowError> {
        {
            let cached = self.token.lock().await;
            if !force_refresh {
                if let Some(token) = cached.as_ref() {
                    let stale_after = Duration::minutes(TOKEN_LIFETIME_MINUTES - TOKEN_SAFETY_MARGIN_MINUTES);
                    if Utc::now() < token.issued_at + stale_after {
                        return Ok(token.access_token.clone());
                    }
                }
            }
        }
        let access_token = self.fetch_token().await?;
        *self.token.lock().await = Some(CachedToken { access_token: access_token.clone(), issued_at: Utc::now() });
        Ok(access_token)
    }

    async fn authorize(&self, request: reqwest::RequestBuilder, force_refresh: bool) -> Result<reqwest::RequestBuilder, WorkflowError> {
        match self.resolve_auth_mode().await? {
            AuthMode::Basic => Ok(request.basic_auth(&self.config.username, Some(&self.config.password))),
            AuthMode::Bearer => {
                let token = self.bearer_token(force_refresh).await?;
                Ok(request.bearer_auth(token))
            }
        }
    }

    /// Sends a request, and on a bearer-mode 401 invalidates the cached
    /// token and retries exactly once before bubbling the failure.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, WorkflowError> {
        let request = self.authorize(build(), false).await?;
        let response = request.send().await.map_err(|e| WorkflowError::Request(e.to_string()))?;
        if response.status().as_u16() != 401 || self.auth_mode.lock().await.as_ref() != Some(&AuthMode::Bearer) {
            return Ok(response);
        }
        let retried = self.authorize(build(), true).await?;
        retried.send().await.map_err(|e| WorkflowError::Request(e.to_string()))
    }
}

#[async_trait]
impl WorkflowExecutor for HttpWorkflowExecutor {
    async fn submit_run(&self, run_id: &str, conf: serde_json::Value) -> Result<String, WorkflowError> {
        let url = format!(
            "{}/dags/{}/dagRuns",
            self.config.base_url.trim_end_matches('/'),
            self.config.dag_id
        );
        let mode = self.resolve_auth_mode().await?;
        let mut body = serde_json::json!({ "dag_run_id": run_id, "conf": conf });
        if mode == AuthMode::Bearer {
            body["logical_date"] = serde_json::Value::String(Utc::now().to_rfc3339());
        }
        let response = self.send_with_retry(|| self.client.post(&url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(WorkflowError::Request(format!("submit run returned {}", response.status())));
        }
        let payload: serde_json::Value =
            response.json().await.map_err(|e| WorkflowError::UnexpectedResponse(e.to_string()))?;
        payload
            .get("dag_run_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| WorkflowError::UnexpectedResponse("missing dag_run_id".to_string()))
    }

    async fn get_run(&self, run_id: &str) -> Result<RunState, WorkflowError> {
        let url = format!(
            "{}/dags/{}/dagRuns/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.dag_id,
            run_id
        );
        let response = self.send_with_retry(|| self.client.get(&url)).await?;
        if response.status().as_u16() == 401 {
            return Err(WorkflowError::Auth("token refresh did not resolve repeated 401".to_string()));
        }
        if !response.status().is_success() {
            return Err(WorkflowError::Request(format!("get run returned {}", response.status())));
        }
        let payload: serde_json::Value =
            response.json().await.map_err(|e| WorkflowError::UnexpectedResponse(e.to_string()))?;
        let state = payload.get("state").and_then(|v| v.as_str()).unwrap_or_default();
        Ok(RunState::from_wire(state))
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{RunState, WorkflowError, WorkflowExecutor};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct State {
        submissions: Vec<(String, serde_json::Value)>,
        run_states: HashMap<String, RunState>,
        fail_submit: bool,
    }

    #[derive(Clone, Default)]
    pub struct FakeWorkflowExecutor {
        state: Arc<Mutex<State>>,
    }

    impl FakeWorkflowExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_run_state(&self, run_id: &str, state: RunState) {
            self.state.lock().run_states.insert(run_id.to_string(), state);
        }

        pub fn fail_next_submit(&self) {
            self.state.lock().fail_submit = true;
        }

        pub fn submissions(&self) -> Vec<(String, serde_json::Value)> {
            self.state.lock().submissions.clone()
        }
    }

    #[async_trait]
    impl WorkflowExecutor for FakeWorkflowExecutor {
        async fn submit_run(&self, run_id: &str, conf: serde_json::Value) -> Result<String, WorkflowError> {
            let mut state = self.state.lock();
            if state.fail_submit {
                state.fail_submit = false;
                return Err(WorkflowError::Request("injected failure".to_string()));
            }
            state.submissions.push((run_id.to_string(), conf));
            state.run_states.entry(run_id.to_string()).or_insert(RunState::Queued);
            Ok(run_id.to_string())
        }

        async fn get_run(&self, run_id: &str) -> Result<RunState, WorkflowError> {
            Ok(self.state.lock().run_states.get(run_id).cloned().unwrap_or(RunState::Queued))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeWorkflowExecutor;

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
