//! Task state poller.
//!
//! Reads the tasks a deployment started and classifies them into one of the
//! three task signals. [`classify`] holds the rules and is pure; the poller
//! only adds the orchestrator call and its timeout.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use shipyard_types::deployment::Deployment;
use shipyard_types::error::OrchestrationError;
use shipyard_types::signal::TaskSignal;
use shipyard_types::task::{TaskHealth, TaskLastStatus, TaskSnapshot};

use super::task_source::TaskStateSource;

/// Classified view of a deployment's tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStateReport {
    pub signal: TaskSignal,
    /// Human-readable reason for the signal.
    pub summary: String,
    pub desired: u32,
    pub running: usize,
    pub pending: usize,
    pub stopped: usize,
    pub unhealthy: usize,
    pub failures: usize,
}

/// Classify a task snapshot for `deployment` at time `now`.
///
/// Rules, first match wins:
/// 1. Any reported failure, stopped task, or unhealthy task is unhealthy.
/// 2. A deployment older than `deployment_timeout` is timed out.
/// 3. No tasks, pending tasks, or fewer running than desired is incomplete.
/// 4. Otherwise the rollout is complete.
///
/// `Unknown` health never blocks completion.
pub fn classify(
    deployment: &Deployment,
    snapshot: &TaskSnapshot,
    now: DateTime<Utc>,
    deployment_timeout: Duration,
) -> TaskStateReport {
    let desired = deployment.desired_task_count;
    let running = snapshot.count(TaskLastStatus::Running);
    let pending = snapshot.count(TaskLastStatus::Pending);
    let stopped = snapshot.count(TaskLastStatus::Stopped);
    let unhealthy = snapshot
        .tasks
        .iter()
        .filter(|t| t.health == TaskHealth::Unhealthy)
        .count();
    let failures = snapshot.failures.len();

    let report = |signal, summary: String| TaskStateReport {
        signal,
        summary,
        desired,
        running,
        pending,
        stopped,
        unhealthy,
        failures,
    };

    if let Some(failure) = snapshot.failures.first() {
        return report(
            TaskSignal::TaskUnhealthyOrTimedOut,
            format!("orchestrator reported failure for {}: {}", failure.arn, failure.reason),
        );
    }
    if stopped > 0 {
        return report(
            TaskSignal::TaskUnhealthyOrTimedOut,
            format!("{stopped} task(s) stopped"),
        );
    }
    if unhealthy > 0 {
        return report(
            TaskSignal::TaskUnhealthyOrTimedOut,
            format!("{unhealthy} task(s) unhealthy"),
        );
    }

    let age = now.signed_duration_since(deployment.created_at);
    if age.to_std().is_ok_and(|age| age > deployment_timeout) {
        return report(
            TaskSignal::TaskUnhealthyOrTimedOut,
            format!("timed out after {}s", deployment_timeout.as_secs()),
        );
    }

    if snapshot.tasks.is_empty() {
        return report(
            TaskSignal::TaskHealthyButIncomplete,
            "no tasks started yet".to_string(),
        );
    }
    if pending > 0 || running < desired as usize {
        return report(
            TaskSignal::TaskHealthyButIncomplete,
            format!("{running}/{desired} running, {pending} pending"),
        );
    }

    report(
        TaskSignal::TaskAllHealthyAndComplete,
        format!("{running}/{desired} running and healthy"),
    )
}

/// Polls the orchestrator for a deployment's task state.
pub struct TaskStatePoller<S: TaskStateSource> {
    source: S,
    deployment_timeout: Duration,
    request_timeout: Duration,
}

impl<S: TaskStateSource> TaskStatePoller<S> {
    pub fn new(source: S, deployment_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            source,
            deployment_timeout,
            request_timeout,
        }
    }

    pub fn deployment_timeout(&self) -> Duration {
        self.deployment_timeout
    }

    /// Describe and classify the tasks of `deployment`. Read-only.
    pub async fn poll(&self, deployment: &Deployment) -> Result<TaskStateReport, OrchestrationError> {
        let cluster = deployment.cluster_identifier();
        let snapshot = tokio::time::timeout(
            self.request_timeout,
            self.source.describe_tasks(cluster, &deployment.deployment_id),
        )
        .await
        .map_err(|_| OrchestrationError::Timeout(self.request_timeout))??;

        let report = classify(deployment, &snapshot, Utc::now(), self.deployment_timeout);
        tracing::debug!(
            deployment_id = %deployment.deployment_id,
            cluster,
            signal = %report.signal,
            summary = %report.summary,
            "classified task state"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use shipyard_types::deployment::DeploymentId;
    use shipyard_types::environment::{EnvironmentId, EnvironmentRevision};
    use shipyard_types::task::{TaskFailure, TaskState};

    const TIMEOUT: Duration = Duration::from_secs(600);

    fn deployment(desired: u32) -> Deployment {
        let env = EnvironmentId::new("acct", "cluster-a", "web").unwrap();
        Deployment::new_pending(EnvironmentRevision::new(env, "rev-1"), desired)
    }

    fn task(id: &str, last_status: TaskLastStatus, health: TaskHealth) -> TaskState {
        TaskState {
            task_id: id.to_string(),
            last_status,
            health,
        }
    }

    fn snapshot(tasks: Vec<TaskState>) -> TaskSnapshot {
        TaskSnapshot {
            tasks,
            failures: vec![],
        }
    }

    fn classify_now(deployment: &Deployment, snapshot: &TaskSnapshot) -> TaskStateReport {
        classify(deployment, snapshot, deployment.created_at, TIMEOUT)
    }

    #[test]
    fn test_all_running_healthy_is_complete() {
        let d = deployment(2);
        let s = snapshot(vec![
            task("t1", TaskLastStatus::Running, TaskHealth::Healthy),
            task("t2", TaskLastStatus::Running, TaskHealth::Healthy),
        ]);
        let report = classify_now(&d, &s);
        assert_eq!(report.signal, TaskSignal::TaskAllHealthyAndComplete);
        assert_eq!(report.running, 2);
    }

    #[test]
    fn test_unknown_health_does_not_block_completion() {
        let d = deployment(1);
        let s = snapshot(vec![task("t1", TaskLastStatus::Running, TaskHealth::Unknown)]);
        assert_eq!(
            classify_now(&d, &s).signal,
            TaskSignal::TaskAllHealthyAndComplete
        );
    }

    #[test]
    fn test_fewer_running_than_desired_is_incomplete() {
        let d = deployment(3);
        let s = snapshot(vec![
            task("t1", TaskLastStatus::Running, TaskHealth::Healthy),
            task("t2", TaskLastStatus::Running, TaskHealth::Healthy),
        ]);
        let report = classify_now(&d, &s);
        assert_eq!(report.signal, TaskSignal::TaskHealthyButIncomplete);
        assert_eq!(report.summary, "2/3 running, 0 pending");
    }

    #[test]
    fn test_pending_task_is_incomplete() {
        let d = deployment(1);
        let s = snapshot(vec![
            task("t1", TaskLastStatus::Running, TaskHealth::Healthy),
            task("t2", TaskLastStatus::Pending, TaskHealth::Unknown),
        ]);
        assert_eq!(
            classify_now(&d, &s).signal,
            TaskSignal::TaskHealthyButIncomplete
        );
    }

    #[test]
    fn test_no_tasks_is_incomplete() {
        let d = deployment(1);
        let report = classify_now(&d, &TaskSnapshot::default());
        assert_eq!(report.signal, TaskSignal::TaskHealthyButIncomplete);
        assert_eq!(report.summary, "no tasks started yet");
    }

    #[test]
    fn test_unhealthy_task_fails() {
        let d = deployment(2);
        let s = snapshot(vec![
            task("t1", TaskLastStatus::Running, TaskHealth::Healthy),
            task("t2", TaskLastStatus::Running, TaskHealth::Unhealthy),
        ]);
        let report = classify_now(&d, &s);
        assert_eq!(report.signal, TaskSignal::TaskUnhealthyOrTimedOut);
        assert_eq!(report.unhealthy, 1);
    }

    #[test]
    fn test_stopped_task_fails() {
        let d = deployment(1);
        let s = snapshot(vec![task("t1", TaskLastStatus::Stopped, TaskHealth::Unknown)]);
        assert_eq!(
            classify_now(&d, &s).signal,
            TaskSignal::TaskUnhealthyOrTimedOut
        );
    }

    #[test]
    fn test_reported_failure_fails() {
        let d = deployment(1);
        let s = TaskSnapshot {
            tasks: vec![task("t1", TaskLastStatus::Running, TaskHealth::Healthy)],
            failures: vec![TaskFailure {
                arn: "arn:task/t0".to_string(),
                reason: "RESOURCE:MEMORY".to_string(),
            }],
        };
        let report = classify_now(&d, &s);
        assert_eq!(report.signal, TaskSignal::TaskUnhealthyOrTimedOut);
        assert!(report.summary.contains("RESOURCE:MEMORY"));
    }

    #[test]
    fn test_past_deadline_times_out() {
        let d = deployment(2);
        let s = snapshot(vec![task("t1", TaskLastStatus::Running, TaskHealth::Healthy)]);
        let later = d.created_at + ChronoDuration::seconds(601);

        let report = classify(&d, &s, later, TIMEOUT);
        assert_eq!(report.signal, TaskSignal::TaskUnhealthyOrTimedOut);
        assert!(report.summary.starts_with("timed out"));
    }

    #[test]
    fn test_unhealthy_wins_over_timeout() {
        let d = deployment(1);
        let s = snapshot(vec![task("t1", TaskLastStatus::Running, TaskHealth::Unhealthy)]);
        let later = d.created_at + ChronoDuration::seconds(3600);
        assert!(
            classify(&d, &s, later, TIMEOUT)
                .summary
                .contains("unhealthy")
        );
    }

    struct FixedSource(TaskSnapshot);

    impl TaskStateSource for FixedSource {
        async fn describe_tasks(
            &self,
            cluster: &str,
            _started_by: &DeploymentId,
        ) -> Result<TaskSnapshot, OrchestrationError> {
            if cluster != "cluster-a" {
                return Err(OrchestrationError::ClusterNotFound(cluster.to_string()));
            }
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_poll_uses_deployment_cluster() {
        let source = FixedSource(snapshot(vec![task(
            "t1",
            TaskLastStatus::Running,
            TaskHealth::Healthy,
        )]));
        let poller = TaskStatePoller::new(source, TIMEOUT, Duration::from_secs(5));

        let report = poller.poll(&deployment(1)).await.unwrap();
        assert_eq!(report.signal, TaskSignal::TaskAllHealthyAndComplete);

        let env = EnvironmentId::new("acct", "cluster-b", "web").unwrap();
        let elsewhere = Deployment::new_pending(EnvironmentRevision::new(env, "rev-1"), 1);
        let err = poller.poll(&elsewhere).await.unwrap_err();
        assert_eq!(err, OrchestrationError::ClusterNotFound("cluster-b".to_string()));
    }
}
