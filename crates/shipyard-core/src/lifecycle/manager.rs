//! Deployment lifecycle manager.
//!
//! The public lifecycle API. Composes the record store, the workflow
//! trigger, and the task state poller, and routes every status change
//! through the state machine and a version-conditional update.

use shipyard_types::config::LifecycleConfig;
use shipyard_types::deployment::{
    CreateDeploymentRequest, Deployment, DeploymentId, DeploymentStatus, DeploymentUpdate,
};
use shipyard_types::error::{DeploymentError, RepositoryError};
use shipyard_types::signal::TaskSignal;
use shipyard_types::workflow::{Rejection, StepInvocation, StepKind, StepOutcome};

use crate::orchestration::poller::{TaskStatePoller, TaskStateReport};
use crate::orchestration::task_source::TaskStateSource;
use crate::repository::deployment::DeploymentRepository;
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::trigger::{WorkflowTrigger, execution_name_for};

use super::retry::StorageRetryPolicy;
use super::state_machine::{self, Transition};

/// Result of applying one signal to a deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalOutcome {
    /// Stored deployment after the signal (unchanged when not written).
    pub deployment: Deployment,
    pub transition: Transition,
    /// Whether a new record version was written.
    pub changed: bool,
}

impl SignalOutcome {
    pub fn rejection(&self) -> Option<Rejection> {
        match self.transition {
            Transition::Reject(rejection) => Some(rejection),
            _ => None,
        }
    }
}

/// Extra fields written together with a status change.
#[derive(Debug, Default)]
struct TransitionFields {
    execution_name: Option<String>,
    failure_reason: Option<String>,
}

/// Public lifecycle API over a record store, a workflow engine, and a
/// task state source.
///
/// Generic over the three ports so the same logic runs against SQLite and
/// HTTP clients in the binary and against in-memory fakes in tests.
pub struct DeploymentLifecycle<R: DeploymentRepository, E: WorkflowEngine, S: TaskStateSource> {
    repo: R,
    trigger: WorkflowTrigger<E>,
    poller: TaskStatePoller<S>,
    storage: StorageRetryPolicy,
    max_conflict_retries: u32,
}

impl<R: DeploymentRepository, E: WorkflowEngine, S: TaskStateSource> DeploymentLifecycle<R, E, S> {
    pub fn new(
        repo: R,
        trigger: WorkflowTrigger<E>,
        poller: TaskStatePoller<S>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            repo,
            trigger,
            poller,
            storage: StorageRetryPolicy::from_config(config),
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    // -----------------------------------------------------------------------
    // Creation and start
    // -----------------------------------------------------------------------

    /// Create a `Pending` deployment and start its workflow.
    ///
    /// If the workflow cannot be started the deployment stays `Pending` (no
    /// rollback) and `WorkflowStartFailure` is returned; the pending sweep
    /// re-attempts the start later.
    #[tracing::instrument(skip_all, fields(environment = %request.environment.environment_id))]
    pub async fn create_deployment(
        &self,
        request: CreateDeploymentRequest,
    ) -> Result<Deployment, DeploymentError> {
        let desired_task_count = request.desired_task_count.unwrap_or(1);
        if desired_task_count == 0 {
            return Err(DeploymentError::InvalidRequest(
                "desired task count must be at least 1".to_string(),
            ));
        }
        if request.environment.revision_id.trim().is_empty() {
            return Err(DeploymentError::InvalidRequest(
                "revision id cannot be empty".to_string(),
            ));
        }
        // A stored record must decode again, so the composite key has to
        // split back into the same parts.
        request
            .environment
            .environment_id
            .validate()
            .map_err(|e| DeploymentError::InvalidRequest(format!("invalid environment: {e}")))?;

        let deployment = Deployment::new_pending(request.environment, desired_task_count);
        let id = deployment.deployment_id.clone();

        let created = match self
            .storage
            .run("create", || self.repo.create(&deployment))
            .await
        {
            Ok(created) => created,
            // An earlier attempt landed before its response was lost.
            Err(RepositoryError::Duplicate(_)) => self.load(&id, "create").await?,
            Err(e) => return Err(DeploymentError::from_repository(e, &id, "create")),
        };

        tracing::info!(
            deployment_id = %id,
            cluster = created.cluster_identifier(),
            revision = %created.environment.revision_id,
            "deployment created"
        );

        self.start_workflow(&id).await
    }

    /// Start the workflow execution of a `Pending` deployment and move it
    /// to `InProgress`.
    ///
    /// Deployments that are no longer `Pending` are returned unchanged.
    #[tracing::instrument(skip_all, fields(deployment_id = %id))]
    pub async fn start_workflow(&self, id: &DeploymentId) -> Result<Deployment, DeploymentError> {
        let current = self.load(id, "start_workflow").await?;
        if current.status != DeploymentStatus::Pending {
            tracing::debug!(status = %current.status, "deployment already started");
            return Ok(current);
        }

        let handle = self.trigger.start_workflow(id).await.map_err(|e| {
            tracing::warn!(
                deployment_id = %id,
                error = %e,
                "workflow start failed, deployment left pending"
            );
            DeploymentError::WorkflowStartFailure {
                deployment_id: id.clone(),
                message: e.to_string(),
            }
        })?;

        let outcome = self
            .transition(
                id,
                TaskSignal::Start,
                TransitionFields {
                    execution_name: Some(handle.execution_name),
                    failure_reason: None,
                },
                "start_workflow",
            )
            .await?;
        Ok(outcome.deployment)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Apply `signal` to the stored deployment through the state machine.
    ///
    /// Rejections other than `Illegal` are returned as a successful outcome
    /// with `changed = false`.
    #[tracing::instrument(skip_all, fields(deployment_id = %id, signal = %signal))]
    pub async fn apply_signal(
        &self,
        id: &DeploymentId,
        signal: TaskSignal,
    ) -> Result<SignalOutcome, DeploymentError> {
        self.transition(id, signal, TransitionFields::default(), "apply_signal")
            .await
    }

    /// Load, decide, and write conditionally on the loaded version.
    ///
    /// A lost version race reloads and re-decides, up to
    /// `max_conflict_retries` times.
    async fn transition(
        &self,
        id: &DeploymentId,
        signal: TaskSignal,
        fields: TransitionFields,
        operation: &'static str,
    ) -> Result<SignalOutcome, DeploymentError> {
        let mut conflicts = 0;
        loop {
            let current = self.load(id, operation).await?;
            let transition = state_machine::transition(current.status, signal);

            let mut update = DeploymentUpdate::new(id.clone()).expecting_version(current.record_version);
            match transition {
                Transition::Reject(Rejection::Illegal) => {
                    tracing::error!(
                        deployment_id = %id,
                        status = %current.status,
                        signal = %signal,
                        "illegal transition requested"
                    );
                    return Err(DeploymentError::IllegalTransition {
                        deployment_id: id.clone(),
                        from: current.status,
                        signal,
                    });
                }
                Transition::Reject(_) => {
                    return Ok(SignalOutcome {
                        deployment: current,
                        transition,
                        changed: false,
                    });
                }
                Transition::Stay(_) => {
                    // Only a missing execution name is worth a write here.
                    match &fields.execution_name {
                        Some(name) if current.execution_name.as_ref() != Some(name) => {
                            update = update.execution_name(name.clone());
                        }
                        _ => {
                            return Ok(SignalOutcome {
                                deployment: current,
                                transition,
                                changed: false,
                            });
                        }
                    }
                }
                Transition::Advance(to) => {
                    update = update.status(to);
                    if let Some(name) = &fields.execution_name {
                        update = update.execution_name(name.clone());
                    }
                    if to == DeploymentStatus::Failed {
                        let reason = fields
                            .failure_reason
                            .clone()
                            .unwrap_or_else(|| signal.to_string());
                        update = update.failure_reason(reason);
                    }
                }
            }

            match self.storage.run(operation, || self.repo.update(&update)).await {
                Ok(updated) => {
                    if transition.is_advance() {
                        tracing::info!(
                            deployment_id = %id,
                            from = %current.status,
                            to = %updated.status,
                            signal = %signal,
                            "deployment transitioned"
                        );
                    }
                    return Ok(SignalOutcome {
                        deployment: updated,
                        transition,
                        changed: true,
                    });
                }
                Err(RepositoryError::VersionConflict { expected, actual })
                    if conflicts < self.max_conflict_retries =>
                {
                    conflicts += 1;
                    tracing::debug!(
                        deployment_id = %id,
                        expected,
                        actual,
                        conflicts,
                        "lost version race, reloading"
                    );
                }
                Err(e) => return Err(DeploymentError::from_repository(e, id, operation)),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Task state
    // -----------------------------------------------------------------------

    /// Read and classify the deployment's task state. Never writes.
    #[tracing::instrument(skip_all, fields(deployment_id = %id))]
    pub async fn poll_task_state(&self, id: &DeploymentId) -> Result<TaskStateReport, DeploymentError> {
        let current = self.load(id, "poll_task_state").await?;
        self.poll(&current).await
    }

    async fn poll(&self, deployment: &Deployment) -> Result<TaskStateReport, DeploymentError> {
        self.poller
            .poll(deployment)
            .await
            .map_err(|e| DeploymentError::TaskStateUnavailable {
                deployment_id: deployment.deployment_id.clone(),
                message: e.to_string(),
            })
    }

    /// The check-task-state workflow step: poll, classify, transition.
    ///
    /// A deployment that is already terminal is not polled; the outcome
    /// carries a `Terminal` rejection so the execution can end.
    #[tracing::instrument(skip_all, fields(deployment_id = %id))]
    pub async fn check_task_state(
        &self,
        id: &DeploymentId,
        token: Option<String>,
    ) -> Result<StepOutcome, DeploymentError> {
        let current = self.load(id, "check_task_state").await?;
        if current.status.is_terminal() {
            return Ok(StepOutcome {
                deployment_id: id.clone(),
                token,
                signal: None,
                status: current.status,
                rejection: Some(Rejection::Terminal {
                    status: current.status,
                }),
                changed: false,
                summary: format!("deployment already {}", current.status),
            });
        }

        let report = self.poll(&current).await?;
        let failure_reason = (report.signal == TaskSignal::TaskUnhealthyOrTimedOut)
            .then(|| report.summary.clone());

        let outcome = self
            .transition(
                id,
                report.signal,
                TransitionFields {
                    execution_name: None,
                    failure_reason,
                },
                "check_task_state",
            )
            .await?;

        Ok(StepOutcome {
            deployment_id: id.clone(),
            token,
            signal: Some(report.signal),
            status: outcome.deployment.status,
            rejection: outcome.rejection(),
            changed: outcome.changed,
            summary: report.summary,
        })
    }

    /// Entry point for the workflow engine's step invocations.
    #[tracing::instrument(skip_all, fields(deployment_id = %invocation.deployment_id, step = ?invocation.step))]
    pub async fn handle_step(&self, invocation: StepInvocation) -> Result<StepOutcome, DeploymentError> {
        let StepInvocation {
            deployment_id,
            token,
            step,
        } = invocation;

        match step {
            StepKind::CheckTaskState => self.check_task_state(&deployment_id, token).await,
            StepKind::Start => {
                let outcome = self
                    .transition(
                        &deployment_id,
                        TaskSignal::Start,
                        TransitionFields {
                            execution_name: Some(execution_name_for(&deployment_id)),
                            failure_reason: None,
                        },
                        "start_step",
                    )
                    .await?;

                let status = outcome.deployment.status;
                let summary = match outcome.rejection() {
                    Some(_) => format!("deployment already {status}"),
                    None => "workflow execution running".to_string(),
                };
                Ok(StepOutcome {
                    deployment_id,
                    token,
                    signal: Some(TaskSignal::Start),
                    status,
                    rejection: outcome.rejection(),
                    changed: outcome.changed,
                    summary,
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries and administration
    // -----------------------------------------------------------------------

    pub async fn get_deployment(&self, id: &DeploymentId) -> Result<Deployment, DeploymentError> {
        self.load(id, "get").await
    }

    /// Deployments in `status`, from the eventually consistent index.
    pub async fn list_by_status(
        &self,
        status: DeploymentStatus,
    ) -> Result<Vec<Deployment>, DeploymentError> {
        self.storage
            .run("list_by_status", || self.repo.list_by_status(status))
            .await
            .map_err(|e| DeploymentError::from_bulk_repository(e, "list_by_status"))
    }

    /// Ids in `status`, from the index. Unlike `list_by_status` this never
    /// drops an entry whose record fails to decode.
    pub async fn list_ids_by_status(
        &self,
        status: DeploymentStatus,
    ) -> Result<Vec<DeploymentId>, DeploymentError> {
        self.storage
            .run("list_ids_by_status", || self.repo.list_ids_by_status(status))
            .await
            .map_err(|e| DeploymentError::from_bulk_repository(e, "list_ids_by_status"))
    }

    pub async fn list_all(&self) -> Result<Vec<Deployment>, DeploymentError> {
        self.storage
            .run("list_all", || self.repo.list_all())
            .await
            .map_err(|e| DeploymentError::from_bulk_repository(e, "list_all"))
    }

    /// Delete every deployment. Test and reset environments only.
    pub async fn delete_all(&self) -> Result<usize, DeploymentError> {
        let deleted = self
            .storage
            .run("delete_all", || self.repo.delete_all())
            .await
            .map_err(|e| DeploymentError::from_bulk_repository(e, "delete_all"))?;
        tracing::warn!(deleted, "deleted all deployments");
        Ok(deleted)
    }

    async fn load(&self, id: &DeploymentId, operation: &'static str) -> Result<Deployment, DeploymentError> {
        self.storage
            .run(operation, || self.repo.get_by_id(id))
            .await
            .map_err(|e| DeploymentError::from_repository(e, id, operation))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::lifecycle::fakes;
    use crate::repository::memory::InMemoryDeploymentRepository;
    use shipyard_types::task::{TaskHealth, TaskLastStatus};

    #[tokio::test]
    async fn test_create_starts_workflow() {
        let (lifecycle, repo, engine, _) = fakes::lifecycle();

        let deployment = lifecycle.create_deployment(fakes::request(2)).await.unwrap();

        assert_eq!(deployment.status, DeploymentStatus::InProgress);
        assert_eq!(deployment.desired_task_count, 2);
        assert_eq!(deployment.record_version, 1);
        assert_eq!(
            deployment.execution_name,
            Some(format!("deployment-{}", deployment.deployment_id))
        );
        assert_eq!(engine.started(), 1);

        let stored = repo.get_by_id(&deployment.deployment_id).await.unwrap();
        assert_eq!(stored, deployment);
    }

    #[tokio::test]
    async fn test_create_defaults_task_count_and_rejects_zero() {
        let (lifecycle, _, _, _) = fakes::lifecycle();

        let mut request = fakes::request(1);
        request.desired_task_count = None;
        let deployment = lifecycle.create_deployment(request).await.unwrap();
        assert_eq!(deployment.desired_task_count, 1);

        let err = lifecycle.create_deployment(fakes::request(0)).await.unwrap_err();
        assert!(matches!(err, DeploymentError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_environment_that_cannot_round_trip() {
        let (lifecycle, repo, engine, _) = fakes::lifecycle();

        // Built field by field, so `EnvironmentId::new` never ran.
        let mut request = fakes::request(1);
        request.environment.environment_id.cluster = "a/b".to_string();

        let err = lifecycle.create_deployment(request).await.unwrap_err();
        let DeploymentError::InvalidRequest(message) = &err else {
            panic!("expected InvalidRequest, got {err:?}");
        };
        assert!(message.contains("cluster 'a/b'"));
        assert!(repo.is_empty());
        assert_eq!(engine.calls(), 0);
        assert!(lifecycle.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_failure_leaves_pending() {
        let (lifecycle, repo, engine, _) = fakes::lifecycle();
        engine.set_down(true);

        let err = lifecycle.create_deployment(fakes::request(1)).await.unwrap_err();
        let DeploymentError::WorkflowStartFailure { deployment_id, .. } = err else {
            panic!("expected WorkflowStartFailure, got {err:?}");
        };
        let stored = repo.get_by_id(&deployment_id).await.unwrap();
        assert_eq!(stored.status, DeploymentStatus::Pending);
        assert!(stored.execution_name.is_none());

        // Retrying once the engine is back moves it on.
        engine.set_down(false);
        let started = lifecycle.start_workflow(&deployment_id).await.unwrap();
        assert_eq!(started.status, DeploymentStatus::InProgress);
    }

    #[tokio::test]
    async fn test_start_workflow_is_idempotent() {
        let (lifecycle, _, engine, _) = fakes::lifecycle();
        let deployment = lifecycle.create_deployment(fakes::request(1)).await.unwrap();

        let again = lifecycle
            .start_workflow(&deployment.deployment_id)
            .await
            .unwrap();
        assert_eq!(again.record_version, deployment.record_version);
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_full_scenario_to_completed() {
        let (lifecycle, repo, _, source) = fakes::lifecycle();
        let deployment = lifecycle.create_deployment(fakes::request(2)).await.unwrap();
        let id = deployment.deployment_id.clone();

        source.set_tasks(&[
            (TaskLastStatus::Running, TaskHealth::Healthy),
            (TaskLastStatus::Running, TaskHealth::Healthy),
        ]);
        let report = lifecycle.poll_task_state(&id).await.unwrap();
        assert_eq!(report.signal, TaskSignal::TaskAllHealthyAndComplete);

        let outcome = lifecycle
            .handle_step(StepInvocation {
                deployment_id: id.clone(),
                token: Some("tok-1".to_string()),
                step: StepKind::CheckTaskState,
            })
            .await
            .unwrap();
        assert_eq!(outcome.status, DeploymentStatus::Completed);
        assert!(outcome.changed);
        assert!(outcome.is_done());
        assert_eq!(outcome.token.as_deref(), Some("tok-1"));

        let stored = repo.get_by_id(&id).await.unwrap();
        assert_eq!(stored.status, DeploymentStatus::Completed);

        // A late poll is rejected without touching the record.
        let late = lifecycle.check_task_state(&id, None).await.unwrap();
        assert_eq!(
            late.rejection,
            Some(Rejection::Terminal {
                status: DeploymentStatus::Completed
            })
        );
        assert!(!late.changed);
        assert_eq!(
            repo.get_by_id(&id).await.unwrap().record_version,
            stored.record_version
        );
    }

    #[tokio::test]
    async fn test_incomplete_rollout_stays_in_progress() {
        let (lifecycle, _, _, source) = fakes::lifecycle();
        let deployment = lifecycle.create_deployment(fakes::request(3)).await.unwrap();

        source.set_tasks(&[
            (TaskLastStatus::Running, TaskHealth::Healthy),
            (TaskLastStatus::Pending, TaskHealth::Unknown),
        ]);
        let outcome = lifecycle
            .check_task_state(&deployment.deployment_id, None)
            .await
            .unwrap();

        assert_eq!(outcome.signal, Some(TaskSignal::TaskHealthyButIncomplete));
        assert_eq!(outcome.status, DeploymentStatus::InProgress);
        assert!(outcome.rejection.is_none());
        assert!(!outcome.changed);
        assert!(!outcome.is_done());
    }

    #[tokio::test]
    async fn test_unhealthy_task_fails_with_reason() {
        let (lifecycle, repo, _, source) = fakes::lifecycle();
        let deployment = lifecycle.create_deployment(fakes::request(1)).await.unwrap();

        source.set_tasks(&[(TaskLastStatus::Running, TaskHealth::Unhealthy)]);
        let outcome = lifecycle
            .check_task_state(&deployment.deployment_id, None)
            .await
            .unwrap();
        assert_eq!(outcome.status, DeploymentStatus::Failed);

        let stored = repo.get_by_id(&deployment.deployment_id).await.unwrap();
        assert_eq!(stored.failure_reason.as_deref(), Some("1 task(s) unhealthy"));
    }

    #[tokio::test]
    async fn test_same_signal_twice_is_idempotent() {
        let (lifecycle, _, _, _) = fakes::lifecycle();
        let deployment = lifecycle.create_deployment(fakes::request(1)).await.unwrap();
        let id = &deployment.deployment_id;

        let first = lifecycle
            .apply_signal(id, TaskSignal::TaskAllHealthyAndComplete)
            .await
            .unwrap();
        let second = lifecycle
            .apply_signal(id, TaskSignal::TaskAllHealthyAndComplete)
            .await
            .unwrap();

        assert_eq!(first.deployment.status, DeploymentStatus::Completed);
        assert_eq!(second.deployment.status, DeploymentStatus::Completed);
        assert!(first.changed);
        assert!(!second.changed);

        let start_again = lifecycle.apply_signal(id, TaskSignal::Start).await.unwrap();
        assert_eq!(start_again.deployment.status, DeploymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_illegal_transition_is_an_error() {
        let (lifecycle, repo, engine, _) = fakes::lifecycle();
        engine.set_down(true);
        let Err(DeploymentError::WorkflowStartFailure { deployment_id, .. }) =
            lifecycle.create_deployment(fakes::request(1)).await
        else {
            panic!("expected start failure");
        };

        let err = lifecycle
            .apply_signal(&deployment_id, TaskSignal::TaskAllHealthyAndComplete)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DeploymentError::IllegalTransition {
                deployment_id: deployment_id.clone(),
                from: DeploymentStatus::Pending,
                signal: TaskSignal::TaskAllHealthyAndComplete,
            }
        );
        assert_eq!(
            repo.get_by_id(&deployment_id).await.unwrap().status,
            DeploymentStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_pending_incomplete_is_not_yet() {
        let (lifecycle, _, engine, _) = fakes::lifecycle();
        engine.set_down(true);
        let Err(DeploymentError::WorkflowStartFailure { deployment_id, .. }) =
            lifecycle.create_deployment(fakes::request(1)).await
        else {
            panic!("expected start failure");
        };

        let outcome = lifecycle
            .apply_signal(&deployment_id, TaskSignal::TaskHealthyButIncomplete)
            .await
            .unwrap();
        assert_eq!(outcome.rejection(), Some(Rejection::NotYet));
        assert!(!outcome.changed);
    }

    #[tokio::test]
    async fn test_start_step_records_execution_name() {
        let (lifecycle, repo, engine, _) = fakes::lifecycle();
        engine.set_down(true);
        let Err(DeploymentError::WorkflowStartFailure { deployment_id, .. }) =
            lifecycle.create_deployment(fakes::request(1)).await
        else {
            panic!("expected start failure");
        };

        let invocation = StepInvocation {
            deployment_id: deployment_id.clone(),
            token: None,
            step: StepKind::Start,
        };
        let outcome = lifecycle.handle_step(invocation.clone()).await.unwrap();
        assert_eq!(outcome.status, DeploymentStatus::InProgress);
        assert!(outcome.changed);

        let stored = repo.get_by_id(&deployment_id).await.unwrap();
        assert_eq!(stored.execution_name, Some(execution_name_for(&deployment_id)));

        let redelivered = lifecycle.handle_step(invocation).await.unwrap();
        assert_eq!(redelivered.status, DeploymentStatus::InProgress);
        assert!(!redelivered.changed);
    }

    #[tokio::test]
    async fn test_task_source_outage_is_reported() {
        let (lifecycle, repo, _, source) = fakes::lifecycle();
        let deployment = lifecycle.create_deployment(fakes::request(1)).await.unwrap();
        source.set_down(true);

        let err = lifecycle
            .check_task_state(&deployment.deployment_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeploymentError::TaskStateUnavailable { .. }));
        assert_eq!(
            repo.get_by_id(&deployment.deployment_id).await.unwrap(),
            deployment
        );
    }

    #[tokio::test]
    async fn test_get_missing_deployment() {
        let (lifecycle, _, _, _) = fakes::lifecycle();
        let id: DeploymentId = "missing".parse().unwrap();
        let err = lifecycle.get_deployment(&id).await.unwrap_err();
        assert_eq!(err, DeploymentError::NotFound(id));
    }

    #[tokio::test]
    async fn test_transient_storage_failure_is_retried() {
        let (lifecycle, repo, _, _) = fakes::lifecycle();
        let deployment = lifecycle.create_deployment(fakes::request(1)).await.unwrap();

        repo.fail_next(2);
        let found = lifecycle
            .get_deployment(&deployment.deployment_id)
            .await
            .unwrap();
        assert_eq!(found.deployment_id, deployment.deployment_id);
    }

    #[tokio::test]
    async fn test_persistent_storage_failure_surfaces() {
        let (lifecycle, repo, _, _) = fakes::lifecycle();
        let deployment = lifecycle.create_deployment(fakes::request(1)).await.unwrap();

        repo.fail_next(10);
        let err = lifecycle
            .get_deployment(&deployment.deployment_id)
            .await
            .unwrap_err();
        let DeploymentError::StorageFailure {
            deployment_id,
            operation,
            ..
        } = err
        else {
            panic!("expected StorageFailure, got {err:?}");
        };
        assert_eq!(deployment_id, Some(deployment.deployment_id));
        assert_eq!(operation, "get");
    }

    #[tokio::test]
    async fn test_listing_tolerates_index_lag() {
        let repo = InMemoryDeploymentRepository::with_manual_index();
        let (lifecycle, engine, _) = fakes::lifecycle_with(repo.clone());
        engine.set_down(true);
        let _ = lifecycle.create_deployment(fakes::request(1)).await;

        assert!(
            lifecycle
                .list_by_status(DeploymentStatus::Pending)
                .await
                .unwrap()
                .is_empty()
        );
        repo.propagate_index();
        assert_eq!(
            lifecycle
                .list_by_status(DeploymentStatus::Pending)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(lifecycle.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_all_on_empty_store() {
        let (lifecycle, _, _, _) = fakes::lifecycle();
        assert_eq!(lifecycle.delete_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_all_partial_failure_is_aggregated() {
        let (lifecycle, repo, _, _) = fakes::lifecycle();
        let stuck = lifecycle.create_deployment(fakes::request(1)).await.unwrap();
        lifecycle.create_deployment(fakes::request(1)).await.unwrap();
        repo.fail_delete_of(&stuck.deployment_id);

        let err = lifecycle.delete_all().await.unwrap_err();
        assert!(err.to_string().contains("1 of 2 items failed"));
    }

    /// Repository that lets another writer bump the version right before
    /// each of the first `races` updates.
    struct RacingRepository {
        inner: InMemoryDeploymentRepository,
        races: AtomicU32,
    }

    impl DeploymentRepository for RacingRepository {
        async fn create(&self, deployment: &Deployment) -> Result<Deployment, RepositoryError> {
            self.inner.create(deployment).await
        }

        async fn update(&self, update: &DeploymentUpdate) -> Result<Deployment, RepositoryError> {
            let remaining = self.races.load(Ordering::SeqCst);
            if remaining > 0 {
                self.races.store(remaining - 1, Ordering::SeqCst);
                self.inner
                    .update(&DeploymentUpdate::new(update.deployment_id.clone()))
                    .await?;
            }
            self.inner.update(update).await
        }

        async fn get_by_id(&self, id: &DeploymentId) -> Result<Deployment, RepositoryError> {
            self.inner.get_by_id(id).await
        }

        async fn list_by_status(
            &self,
            status: DeploymentStatus,
        ) -> Result<Vec<Deployment>, RepositoryError> {
            self.inner.list_by_status(status).await
        }

        async fn list_ids_by_status(
            &self,
            status: DeploymentStatus,
        ) -> Result<Vec<DeploymentId>, RepositoryError> {
            self.inner.list_ids_by_status(status).await
        }

        async fn list_all(&self) -> Result<Vec<Deployment>, RepositoryError> {
            self.inner.list_all().await
        }

        async fn delete_all(&self) -> Result<usize, RepositoryError> {
            self.inner.delete_all().await
        }
    }

    #[tokio::test]
    async fn test_lost_race_reloads_and_converges() {
        let inner = InMemoryDeploymentRepository::new();
        let repo = RacingRepository {
            inner: inner.clone(),
            races: AtomicU32::new(0),
        };
        let (lifecycle, _, _) = fakes::lifecycle_with(repo);
        let deployment = lifecycle.create_deployment(fakes::request(1)).await.unwrap();

        lifecycle.repo.races.store(2, Ordering::SeqCst);
        let outcome = lifecycle
            .apply_signal(&deployment.deployment_id, TaskSignal::TaskAllHealthyAndComplete)
            .await
            .unwrap();
        assert_eq!(outcome.deployment.status, DeploymentStatus::Completed);
        // create + start + two foreign bumps + the transition itself
        assert_eq!(outcome.deployment.record_version, 4);
    }

    #[tokio::test]
    async fn test_conflict_budget_exhausted() {
        let repo = RacingRepository {
            inner: InMemoryDeploymentRepository::new(),
            races: AtomicU32::new(0),
        };
        let (lifecycle, _, _) = fakes::lifecycle_with(repo);
        let deployment = lifecycle.create_deployment(fakes::request(1)).await.unwrap();

        lifecycle.repo.races.store(100, Ordering::SeqCst);
        let err = lifecycle
            .apply_signal(&deployment.deployment_id, TaskSignal::TaskUnhealthyOrTimedOut)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DeploymentError::ConcurrencyConflict {
                deployment_id: deployment.deployment_id.clone(),
                operation: "apply_signal",
            }
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_source_reads_deployment_cluster() {
        let (lifecycle, _, _, source) = fakes::lifecycle();
        let deployment = lifecycle.create_deployment(fakes::request(1)).await.unwrap();
        source.set_tasks(&[(TaskLastStatus::Running, TaskHealth::Healthy)]);

        lifecycle
            .poll_task_state(&deployment.deployment_id)
            .await
            .unwrap();
        assert_eq!(
            source.last_query(),
            Some((fakes::CLUSTER.to_string(), deployment.deployment_id.clone()))
        );
    }
}
