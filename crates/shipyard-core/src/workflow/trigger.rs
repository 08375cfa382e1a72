//! Workflow trigger: starts exactly one workflow execution per deployment.
//!
//! The execution name is derived from the deployment id alone, so a retried
//! start lands on the same name and the engine's duplicate-name rejection
//! turns into a success here.

use std::time::Duration;

use sha2::{Digest, Sha256};

use shipyard_types::deployment::DeploymentId;
use shipyard_types::error::WorkflowError;
use shipyard_types::workflow::{ExecutionHandle, ExecutionInput, StartExecutionRequest};

use super::engine::WorkflowEngine;

/// Prefix of every execution name.
pub const EXECUTION_NAME_PREFIX: &str = "deployment-";

/// Longest execution name the engine accepts.
pub const MAX_EXECUTION_NAME_LEN: usize = 80;

/// Hex digits of the id digest appended to rewritten names.
const NAME_DIGEST_LEN: usize = 12;

/// Deterministic execution name for a deployment.
///
/// Characters outside `[A-Za-z0-9_-]` become `-` and the result is cut to
/// [`MAX_EXECUTION_NAME_LEN`]. When either step changed the name, a short
/// SHA-256 digest of the raw id is appended so that distinct ids (`a/b`
/// and `a:b`) never share an execution name.
pub fn execution_name_for(deployment_id: &DeploymentId) -> String {
    let raw = format!("{EXECUTION_NAME_PREFIX}{deployment_id}");
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();

    if sanitized == raw && sanitized.len() <= MAX_EXECUTION_NAME_LEN {
        return sanitized;
    }

    let digest = format!("{:x}", Sha256::digest(deployment_id.as_str().as_bytes()));
    let mut name = sanitized;
    // Only ASCII remains, so byte truncation is safe.
    name.truncate(MAX_EXECUTION_NAME_LEN - NAME_DIGEST_LEN - 1);
    name.push('-');
    name.push_str(&digest[..NAME_DIGEST_LEN]);
    name
}

/// JSON input handed to the first workflow step.
pub fn execution_input(deployment_id: &DeploymentId) -> Result<String, WorkflowError> {
    serde_json::to_string(&ExecutionInput {
        deployment_id: deployment_id.clone(),
    })
    .map_err(|e| WorkflowError::Rejected(format!("cannot encode execution input: {e}")))
}

/// Starts workflow executions against a configured state machine.
pub struct WorkflowTrigger<E: WorkflowEngine> {
    engine: E,
    state_machine_id: String,
    timeout: Duration,
}

impl<E: WorkflowEngine> WorkflowTrigger<E> {
    pub fn new(engine: E, state_machine_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            engine,
            state_machine_id: state_machine_id.into(),
            timeout,
        }
    }

    pub fn state_machine_id(&self) -> &str {
        &self.state_machine_id
    }

    /// Start the execution for `deployment_id`.
    ///
    /// An execution that already exists is reported as success with
    /// `already_running = true`. The engine call is bounded by the
    /// configured timeout.
    pub async fn start_workflow(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<ExecutionHandle, WorkflowError> {
        let request = StartExecutionRequest {
            state_machine_id: self.state_machine_id.clone(),
            name: execution_name_for(deployment_id),
            input: execution_input(deployment_id)?,
        };

        let result = tokio::time::timeout(self.timeout, self.engine.start_execution(&request))
            .await
            .map_err(|_| WorkflowError::Timeout(self.timeout))?;

        match result {
            Ok(handle) => {
                tracing::info!(
                    deployment_id = %deployment_id,
                    execution_name = %handle.execution_name,
                    "started workflow execution"
                );
                Ok(handle)
            }
            Err(WorkflowError::AlreadyExists(_)) => {
                tracing::info!(
                    deployment_id = %deployment_id,
                    execution_name = %request.name,
                    "workflow execution already running"
                );
                Ok(ExecutionHandle {
                    execution_name: request.name,
                    execution_id: None,
                    started_at: None,
                    already_running: true,
                })
            }
            Err(e) => Err(e),
        }
    }
}
