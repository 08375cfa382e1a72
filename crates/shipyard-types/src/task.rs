//! Task state snapshots reported by the container-orchestration API.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Coarse lifecycle phase of a cluster task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskLastStatus {
    /// Provisioning, pending, or activating.
    Pending,
    Running,
    /// Deactivating, stopping, deprovisioning, or stopped.
    Stopped,
}

impl fmt::Display for TaskLastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskLastStatus::Pending => write!(f, "PENDING"),
            TaskLastStatus::Running => write!(f, "RUNNING"),
            TaskLastStatus::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl FromStr for TaskLastStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PROVISIONING" | "PENDING" | "ACTIVATING" => Ok(TaskLastStatus::Pending),
            "RUNNING" => Ok(TaskLastStatus::Running),
            "DEACTIVATING" | "STOPPING" | "DEPROVISIONING" | "STOPPED" => {
                Ok(TaskLastStatus::Stopped)
            }
            other => Err(format!("invalid task status: '{other}'")),
        }
    }
}

/// Container health as reported by the orchestrator.
///
/// `Unknown` is what the orchestrator reports when no health check is
/// configured, so it does not by itself block completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskHealth {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

impl FromStr for TaskHealth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HEALTHY" => Ok(TaskHealth::Healthy),
            "UNHEALTHY" => Ok(TaskHealth::Unhealthy),
            "UNKNOWN" | "" => Ok(TaskHealth::Unknown),
            other => Err(format!("invalid task health: '{other}'")),
        }
    }
}

/// One task started on behalf of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    pub task_id: String,
    pub last_status: TaskLastStatus,
    #[serde(default)]
    pub health: TaskHealth,
}

/// A placement or lookup failure reported alongside the task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailure {
    pub arn: String,
    pub reason: String,
}

/// Everything the orchestrator reports about a deployment's tasks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskSnapshot {
    #[serde(default)]
    pub tasks: Vec<TaskState>,
    #[serde(default)]
    pub failures: Vec<TaskFailure>,
}

impl TaskSnapshot {
    pub fn count(&self, status: TaskLastStatus) -> usize {
        self.tasks.iter().filter(|t| t.last_status == status).count()
    }
}
