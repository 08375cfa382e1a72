//! Workflow engine request/response types and the step invocation contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deployment::{DeploymentId, DeploymentStatus};
use crate::signal::TaskSignal;

/// Request to start one workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExecutionRequest {
    /// Pre-provisioned state machine the execution runs.
    pub state_machine_id: String,
    /// Unique per deployment; duplicate names are rejected by the engine.
    pub name: String,
    /// JSON payload handed to the first step.
    pub input: String,
}

/// Handle to a started workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHandle {
    pub execution_name: String,
    /// Engine-assigned id. `None` when the engine reported the execution as
    /// already existing and did not return it.
    pub execution_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// True when an earlier attempt had already started this execution.
    pub already_running: bool,
}

/// Input payload of every execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionInput {
    pub deployment_id: DeploymentId,
}

/// Step the workflow engine is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    Start,
    CheckTaskState,
}

/// One invocation of a workflow step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInvocation {
    pub deployment_id: DeploymentId,
    /// Step-specific token from the engine, echoed back for correlation.
    #[serde(default)]
    pub token: Option<String>,
    pub step: StepKind,
}

/// Why a signal did not change the stored status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Rejection {
    /// Condition not met yet; the engine should poll again.
    NotYet,
    /// The deployment already finished; the execution should end.
    Terminal { status: DeploymentStatus },
    /// The signal targets a terminal state from a non-predecessor state.
    Illegal,
}

/// Result of one workflow step, returned to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub deployment_id: DeploymentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Signal the step evaluated. `None` when the deployment was already
    /// terminal and no check was needed.
    pub signal: Option<TaskSignal>,
    /// Stored status after the step.
    pub status: DeploymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    /// Whether the stored record was written by this step.
    pub changed: bool,
    pub summary: String,
}

impl StepOutcome {
    /// Whether the workflow execution should stop invoking steps.
    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }
}
