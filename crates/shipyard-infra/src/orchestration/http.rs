//! HttpTaskStateSource -- concrete [`TaskStateSource`] over a JSON HTTP API.
//!
//! `GET {endpoint}/clusters/{cluster}/tasks?startedBy={deploymentId}`.

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use shipyard_core::orchestration::task_source::TaskStateSource;
use shipyard_types::deployment::DeploymentId;
use shipyard_types::error::OrchestrationError;
use shipyard_types::task::{TaskFailure, TaskHealth, TaskSnapshot, TaskState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeTasksResponse {
    #[serde(default)]
    tasks: Vec<WireTask>,
    #[serde(default)]
    failures: Vec<WireFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTask {
    task_id: String,
    last_status: String,
    #[serde(default)]
    health_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFailure {
    #[serde(default)]
    arn: String,
    #[serde(default)]
    reason: String,
}

pub struct HttpTaskStateSource {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTaskStateSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, OrchestrationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                OrchestrationError::Transport(format!("failed to create HTTP client: {e}"))
            })?;

        let endpoint = Url::parse(endpoint).map_err(|e| {
            OrchestrationError::Transport(format!("invalid orchestrator endpoint '{endpoint}': {e}"))
        })?;

        Ok(Self { client, endpoint })
    }

    /// `{endpoint}/clusters/{cluster}/tasks`, with the cluster name
    /// percent-encoded as a single path segment.
    fn tasks_url(&self, cluster: &str) -> Result<Url, OrchestrationError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| {
                OrchestrationError::Transport(format!(
                    "orchestrator endpoint '{}' cannot take a path",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(["clusters", cluster, "tasks"]);
        Ok(url)
    }
}

fn into_snapshot(response: DescribeTasksResponse) -> Result<TaskSnapshot, OrchestrationError> {
    let tasks = response
        .tasks
        .into_iter()
        .map(|task| {
            let last_status = task.last_status.parse().map_err(malformed)?;
            let health = match task.health_status.as_deref() {
                Some(h) => h.parse().map_err(malformed)?,
                None => TaskHealth::Unknown,
            };
            Ok(TaskState {
                task_id: task.task_id,
                last_status,
                health,
            })
        })
        .collect::<Result<Vec<_>, OrchestrationError>>()?;

    let failures = response
        .failures
        .into_iter()
        .map(|f| TaskFailure {
            arn: f.arn,
            reason: f.reason,
        })
        .collect();

    Ok(TaskSnapshot { tasks, failures })
}

fn malformed(message: String) -> OrchestrationError {
    OrchestrationError::Transport(format!("malformed task description: {message}"))
}

impl TaskStateSource for HttpTaskStateSource {
    async fn describe_tasks(
        &self,
        cluster: &str,
        started_by: &DeploymentId,
    ) -> Result<TaskSnapshot, OrchestrationError> {
        let response = self
            .client
            .get(self.tasks_url(cluster)?)
            .query(&[("startedBy", started_by.as_str())])
            .send()
            .await
            .map_err(|e| OrchestrationError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                404 => OrchestrationError::ClusterNotFound(cluster.to_string()),
                _ => OrchestrationError::Transport(format!("HTTP {status}: {body}")),
            });
        }

        let body: DescribeTasksResponse = response.json().await.map_err(|e| {
            OrchestrationError::Transport(format!("failed to parse task description: {e}"))
        })?;
        into_snapshot(body)
    }
}
