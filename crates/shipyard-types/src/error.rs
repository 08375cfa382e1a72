use std::time::Duration;

use thiserror::Error;

use crate::deployment::{DeploymentId, DeploymentStatus};
use crate::signal::TaskSignal;

/// Errors from repository operations (used by trait definitions in shipyard-core).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("entity not found")]
    NotFound,

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: i64, actual: i64 },

    #[error("storage error: {0}")]
    Storage(String),

    /// A stored record that cannot be decoded. Retrying reads the same bytes.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("bulk operation partially applied: {failed} of {attempted} items failed")]
    PartialFailure { attempted: usize, failed: usize },
}

impl RepositoryError {
    /// Transport or service failures that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Storage(_))
    }
}

/// Errors reported by the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("execution '{0}' already exists")]
    AlreadyExists(String),

    #[error("engine rejected request: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("engine call timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors reported by the container-orchestration API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestrationError {
    #[error("cluster '{0}' not found")]
    ClusterNotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("orchestrator call timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors surfaced by the public deployment lifecycle API.
///
/// Every variant names the deployment (where there is one) and the
/// operation that was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeploymentError {
    #[error("deployment {0} not found")]
    NotFound(DeploymentId),

    #[error("concurrent update of deployment {deployment_id} during {operation}; reload and retry")]
    ConcurrencyConflict {
        deployment_id: DeploymentId,
        operation: &'static str,
    },

    #[error("storage failure during {operation}{}: {message}", fmt_target(.deployment_id))]
    StorageFailure {
        deployment_id: Option<DeploymentId>,
        operation: &'static str,
        message: String,
    },

    #[error("could not start workflow for deployment {deployment_id}: {message}")]
    WorkflowStartFailure {
        deployment_id: DeploymentId,
        message: String,
    },

    #[error("task state unavailable for deployment {deployment_id}: {message}")]
    TaskStateUnavailable {
        deployment_id: DeploymentId,
        message: String,
    },

    #[error("illegal transition for deployment {deployment_id}: {signal} while {from}")]
    IllegalTransition {
        deployment_id: DeploymentId,
        from: DeploymentStatus,
        signal: TaskSignal,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

fn fmt_target(deployment_id: &Option<DeploymentId>) -> String {
    deployment_id
        .as_ref()
        .map(|id| format!(" of deployment {id}"))
        .unwrap_or_default()
}

impl DeploymentError {
    /// Map a repository error for a single-deployment operation.
    pub fn from_repository(
        err: RepositoryError,
        deployment_id: &DeploymentId,
        operation: &'static str,
    ) -> Self {
        match err {
            RepositoryError::NotFound => DeploymentError::NotFound(deployment_id.clone()),
            RepositoryError::VersionConflict { .. } => DeploymentError::ConcurrencyConflict {
                deployment_id: deployment_id.clone(),
                operation,
            },
            other => DeploymentError::StorageFailure {
                deployment_id: Some(deployment_id.clone()),
                operation,
                message: other.to_string(),
            },
        }
    }

    /// Map a repository error for an operation spanning many deployments.
    pub fn from_bulk_repository(err: RepositoryError, operation: &'static str) -> Self {
        DeploymentError::StorageFailure {
            deployment_id: None,
            operation,
            message: err.to_string(),
        }
    }

    /// Whether the caller may safely retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeploymentError::ConcurrencyConflict { .. }
                | DeploymentError::WorkflowStartFailure { .. }
                | DeploymentError::TaskStateUnavailable { .. }
        )
    }
}
