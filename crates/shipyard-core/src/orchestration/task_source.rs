//! Container-orchestration port.

use shipyard_types::deployment::DeploymentId;
use shipyard_types::error::OrchestrationError;
use shipyard_types::task::TaskSnapshot;

/// Read-only view of the tasks a deployment started on a cluster.
///
/// Implementations live in shipyard-infra (e.g., HttpTaskStateSource).
pub trait TaskStateSource: Send + Sync {
    /// Describe every task on `cluster` whose `startedBy` tag is the
    /// deployment id, plus any failures the orchestrator reported.
    fn describe_tasks(
        &self,
        cluster: &str,
        started_by: &DeploymentId,
    ) -> impl std::future::Future<Output = Result<TaskSnapshot, OrchestrationError>> + Send;
}
