//! Reconciliation sweeps over the status index.
//!
//! The index may lag, so every listed deployment is re-read by id before
//! anything is done to it. Per-deployment failures, including records that
//! no longer decode, are collected into the report rather than aborting the
//! sweep.

use serde::Serialize;

use shipyard_types::deployment::{Deployment, DeploymentId, DeploymentStatus};
use shipyard_types::error::DeploymentError;

use crate::orchestration::task_source::TaskStateSource;
use crate::repository::deployment::DeploymentRepository;
use crate::workflow::engine::WorkflowEngine;

use super::manager::DeploymentLifecycle;

/// Which non-terminal status a sweep re-drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    /// Re-attempt workflow starts.
    Pending,
    /// Run the check-task-state step.
    InProgress,
}

impl SweepKind {
    pub fn status(self) -> DeploymentStatus {
        match self {
            SweepKind::Pending => DeploymentStatus::Pending,
            SweepKind::InProgress => DeploymentStatus::InProgress,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepFailure {
    pub deployment_id: DeploymentId,
    pub error: String,
}

/// Aggregated result of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub kind: SweepKind,
    /// Entries returned by the index.
    pub examined: usize,
    /// Deployments whose stored status changed.
    pub acted: usize,
    /// Deployments checked but left as they were.
    pub unchanged: usize,
    /// Index entries whose record had moved on or disappeared.
    pub stale: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn new(kind: SweepKind) -> Self {
        Self {
            kind,
            examined: 0,
            acted: 0,
            unchanged: 0,
            stale: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_failure(&mut self, deployment_id: &DeploymentId, error: &DeploymentError) {
        tracing::warn!(
            deployment_id = %deployment_id,
            kind = ?self.kind,
            error = %error,
            "sweep item failed"
        );
        self.failures.push(SweepFailure {
            deployment_id: deployment_id.clone(),
            error: error.to_string(),
        });
    }
}

impl<R: DeploymentRepository, E: WorkflowEngine, S: TaskStateSource> DeploymentLifecycle<R, E, S> {
    /// Re-attempt the workflow start of every deployment still `Pending`.
    #[tracing::instrument(skip_all)]
    pub async fn sweep_pending(&self) -> Result<SweepReport, DeploymentError> {
        let mut report = SweepReport::new(SweepKind::Pending);
        for id in self.list_ids_by_status(DeploymentStatus::Pending).await? {
            report.examined += 1;
            let Some(current) = self.recheck(&id, SweepKind::Pending, &mut report).await else {
                continue;
            };

            match self.start_workflow(&current.deployment_id).await {
                Ok(started) if started.status != DeploymentStatus::Pending => report.acted += 1,
                Ok(_) => report.unchanged += 1,
                Err(e) => report.record_failure(&current.deployment_id, &e),
            }
        }
        log_report(&report);
        Ok(report)
    }

    /// Run the check-task-state step for every deployment `InProgress`.
    #[tracing::instrument(skip_all)]
    pub async fn sweep_in_progress(&self) -> Result<SweepReport, DeploymentError> {
        let mut report = SweepReport::new(SweepKind::InProgress);
        for id in self.list_ids_by_status(DeploymentStatus::InProgress).await? {
            report.examined += 1;
            let Some(current) = self.recheck(&id, SweepKind::InProgress, &mut report).await
            else {
                continue;
            };

            match self.check_task_state(&current.deployment_id, None).await {
                Ok(outcome) if outcome.changed => report.acted += 1,
                Ok(_) => report.unchanged += 1,
                Err(e) => report.record_failure(&current.deployment_id, &e),
            }
        }
        log_report(&report);
        Ok(report)
    }

    pub async fn sweep(&self, kind: SweepKind) -> Result<SweepReport, DeploymentError> {
        match kind {
            SweepKind::Pending => self.sweep_pending().await,
            SweepKind::InProgress => self.sweep_in_progress().await,
        }
    }

    /// Point-read a listed deployment. `None` when it should be skipped.
    async fn recheck(
        &self,
        id: &DeploymentId,
        kind: SweepKind,
        report: &mut SweepReport,
    ) -> Option<Deployment> {
        match self.get_deployment(id).await {
            Ok(current) if current.status == kind.status() => Some(current),
            Ok(current) => {
                tracing::debug!(
                    deployment_id = %current.deployment_id,
                    indexed = %kind.status(),
                    status = %current.status,
                    "stale index entry"
                );
                report.stale += 1;
                None
            }
            Err(DeploymentError::NotFound(id)) => {
                tracing::debug!(deployment_id = %id, "indexed deployment no longer exists");
                report.stale += 1;
                None
            }
            Err(e) => {
                report.record_failure(id, &e);
                None
            }
        }
    }
}

fn log_report(report: &SweepReport) {
    tracing::info!(
        kind = ?report.kind,
        examined = report.examined,
        acted = report.acted,
        unchanged = report.unchanged,
        stale = report.stale,
        failed = report.failures.len(),
        "sweep finished"
    );
}
