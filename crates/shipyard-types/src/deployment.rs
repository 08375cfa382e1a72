use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::environment::EnvironmentRevision;

/// Opaque identifier of a deployment.
///
/// New ids are UUID v7 strings (time-sortable), but ids read back from
/// storage or received from the workflow engine are never parsed -- any
/// non-empty string is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(String);

impl DeploymentId {
    /// Generate a fresh, time-sortable deployment id.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeploymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeploymentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("deployment id cannot be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// A tracked unit of rollout work targeting one environment revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub deployment_id: DeploymentId,
    /// Environment revision being rolled out. Immutable after creation.
    pub environment: EnvironmentRevision,
    /// Current lifecycle state. Only moves along the state machine edges.
    pub status: DeploymentStatus,
    /// Number of tasks that must be running before the deployment completes.
    pub desired_task_count: u32,
    /// Workflow execution name, set once the workflow has been started.
    pub execution_name: Option<String>,
    /// Why the deployment failed, when it did.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    /// Optimistic-concurrency version. Zero on creation, +1 per update.
    pub record_version: i64,
}

impl Deployment {
    /// Build a new `Pending` deployment for an environment revision.
    pub fn new_pending(environment: EnvironmentRevision, desired_task_count: u32) -> Self {
        let now = Utc::now();
        Self {
            deployment_id: DeploymentId::new(),
            environment,
            status: DeploymentStatus::Pending,
            desired_task_count,
            execution_name: None,
            failure_reason: None,
            created_at: now,
            last_updated_at: now,
            record_version: 0,
        }
    }

    /// Cluster identifier the deployment targets.
    pub fn cluster_identifier(&self) -> &str {
        self.environment.cluster()
    }
}

/// Deployment lifecycle states.
///
/// - Pending: created, workflow not yet started
/// - InProgress: workflow running, tasks being rolled out
/// - Completed: all tasks healthy (terminal)
/// - Failed: tasks unhealthy or timed out (terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl DeploymentStatus {
    pub const ALL: [DeploymentStatus; 4] = [
        DeploymentStatus::Pending,
        DeploymentStatus::InProgress,
        DeploymentStatus::Completed,
        DeploymentStatus::Failed,
    ];

    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentStatus::Completed | DeploymentStatus::Failed)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStatus::Pending => write!(f, "pending"),
            DeploymentStatus::InProgress => write!(f, "in_progress"),
            DeploymentStatus::Completed => write!(f, "completed"),
            DeploymentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(DeploymentStatus::Pending),
            "in_progress" | "inprogress" => Ok(DeploymentStatus::InProgress),
            "completed" => Ok(DeploymentStatus::Completed),
            "failed" => Ok(DeploymentStatus::Failed),
            other => Err(format!("invalid deployment status: '{other}'")),
        }
    }
}

/// Request to create a new deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentRequest {
    pub environment: EnvironmentRevision,
    /// Defaults to 1 when omitted.
    #[serde(default)]
    pub desired_task_count: Option<u32>,
}

/// Field-wise update of a stored deployment.
///
/// Only the `Some` fields are applied; everything else keeps its stored
/// value. Identity, environment, and timestamps cannot be changed here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeploymentUpdate {
    pub deployment_id: DeploymentId,
    /// When set, the update is rejected unless the stored version matches.
    pub expected_version: Option<i64>,
    pub status: Option<DeploymentStatus>,
    pub execution_name: Option<String>,
    pub failure_reason: Option<String>,
}

impl DeploymentUpdate {
    pub fn new(deployment_id: DeploymentId) -> Self {
        Self {
            deployment_id,
            ..Default::default()
        }
    }

    pub fn expecting_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn status(mut self, status: DeploymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn execution_name(mut self, name: impl Into<String>) -> Self {
        self.execution_name = Some(name.into());
        self
    }

    pub fn failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    /// Merge the set fields onto `deployment`. Version and timestamps are
    /// left to the store.
    pub fn apply_to(&self, deployment: &mut Deployment) {
        if let Some(status) = self.status {
            deployment.status = status;
        }
        if let Some(name) = &self.execution_name {
            deployment.execution_name = Some(name.clone());
        }
        if let Some(reason) = &self.failure_reason {
            deployment.failure_reason = Some(reason.clone());
        }
    }
}
