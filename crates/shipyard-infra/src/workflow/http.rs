//! HttpWorkflowEngine -- concrete [`WorkflowEngine`] over a JSON HTTP API.
//!
//! `POST {endpoint}/executions` with the start request as the body. A 409
//! means an execution with that name already exists.
//!
//! The optional bearer token is wrapped in [`secrecy::SecretString`] and is
//! only exposed when building the request header.

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use shipyard_core::workflow::engine::WorkflowEngine;
use shipyard_types::error::WorkflowError;
use shipyard_types::workflow::{ExecutionHandle, StartExecutionRequest};

/// Successful start response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionResponse {
    execution_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

pub struct HttpWorkflowEngine {
    client: reqwest::Client,
    endpoint: String,
    token: Option<SecretString>,
}

impl HttpWorkflowEngine {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, WorkflowError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkflowError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    fn executions_url(&self) -> String {
        format!("{}/executions", self.endpoint)
    }
}

/// Map a non-success status to a workflow error.
fn status_error(status: reqwest::StatusCode, execution_name: &str, body: String) -> WorkflowError {
    match status.as_u16() {
        409 => WorkflowError::AlreadyExists(execution_name.to_string()),
        _ => WorkflowError::Rejected(format!("HTTP {status}: {body}")),
    }
}

fn into_handle(execution_name: &str, response: StartExecutionResponse) -> ExecutionHandle {
    ExecutionHandle {
        execution_name: execution_name.to_string(),
        execution_id: response.execution_id,
        started_at: response.started_at,
        already_running: false,
    }
}

impl WorkflowEngine for HttpWorkflowEngine {
    async fn start_execution(
        &self,
        request: &StartExecutionRequest,
    ) -> Result<ExecutionHandle, WorkflowError> {
        let mut builder = self.client.post(self.executions_url()).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            WorkflowError::Transport(format!("HTTP request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &request.name, body));
        }

        let body: StartExecutionResponse = response.json().await.map_err(|e| {
            WorkflowError::Transport(format!("failed to parse start response: {e}"))
        })?;
        Ok(into_handle(&request.name, body))
    }
}
