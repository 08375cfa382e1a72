//! Workflow engine port.

use shipyard_types::error::WorkflowError;
use shipyard_types::workflow::{ExecutionHandle, StartExecutionRequest};

/// External workflow engine that runs one execution per deployment.
///
/// The engine drives the deployment by invoking the step handlers
/// (`DeploymentLifecycle::handle_step`) until a terminal status is reached.
/// Implementations live in shipyard-infra (e.g., HttpWorkflowEngine).
pub trait WorkflowEngine: Send + Sync {
    /// Start a named execution of a pre-provisioned state machine.
    ///
    /// Must fail with `WorkflowError::AlreadyExists` when an execution with
    /// the same name was already started.
    fn start_execution(
        &self,
        request: &StartExecutionRequest,
    ) -> impl std::future::Future<Output = Result<ExecutionHandle, WorkflowError>> + Send;
}
