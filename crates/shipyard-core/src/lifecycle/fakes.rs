//! Hand-written collaborator fakes shared by the lifecycle tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use shipyard_types::config::LifecycleConfig;
use shipyard_types::deployment::{CreateDeploymentRequest, DeploymentId};
use shipyard_types::environment::{EnvironmentId, EnvironmentRevision};
use shipyard_types::error::{OrchestrationError, WorkflowError};
use shipyard_types::task::{TaskHealth, TaskLastStatus, TaskSnapshot, TaskState};
use shipyard_types::workflow::{ExecutionHandle, StartExecutionRequest};

use crate::orchestration::poller::TaskStatePoller;
use crate::orchestration::task_source::TaskStateSource;
use crate::repository::deployment::DeploymentRepository;
use crate::repository::memory::InMemoryDeploymentRepository;
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::trigger::WorkflowTrigger;

use super::manager::DeploymentLifecycle;

pub const CLUSTER: &str = "cluster-a";

pub type FakeLifecycle<R> = DeploymentLifecycle<R, FakeEngine, FakeTaskSource>;

#[derive(Default)]
struct EngineState {
    started: HashSet<String>,
    calls: usize,
    down: bool,
}

/// Workflow engine that rejects duplicate names and can be switched off.
#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub fn set_down(&self, down: bool) {
        self.state.lock().unwrap().down = down;
    }

    /// Distinct executions started.
    pub fn started(&self) -> usize {
        self.state.lock().unwrap().started.len()
    }

    /// Every start request received, including rejected ones.
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

impl WorkflowEngine for FakeEngine {
    async fn start_execution(
        &self,
        request: &StartExecutionRequest,
    ) -> Result<ExecutionHandle, WorkflowError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.down {
            return Err(WorkflowError::Transport("connection refused".to_string()));
        }
        if !state.started.insert(request.name.clone()) {
            return Err(WorkflowError::AlreadyExists(request.name.clone()));
        }
        Ok(ExecutionHandle {
            execution_name: request.name.clone(),
            execution_id: Some(format!("exec-{}", state.calls)),
            started_at: Some(Utc::now()),
            already_running: false,
        })
    }
}

#[derive(Default)]
struct SourceState {
    snapshot: TaskSnapshot,
    down: bool,
    last_query: Option<(String, DeploymentId)>,
}

/// Task state source returning a settable snapshot.
#[derive(Clone, Default)]
pub struct FakeTaskSource {
    state: Arc<Mutex<SourceState>>,
}

impl FakeTaskSource {
    pub fn set_tasks(&self, tasks: &[(TaskLastStatus, TaskHealth)]) {
        let tasks = tasks
            .iter()
            .enumerate()
            .map(|(i, (last_status, health))| TaskState {
                task_id: format!("task-{i}"),
                last_status: *last_status,
                health: *health,
            })
            .collect();
        self.state.lock().unwrap().snapshot = TaskSnapshot {
            tasks,
            failures: vec![],
        };
    }

    pub fn set_down(&self, down: bool) {
        self.state.lock().unwrap().down = down;
    }

    pub fn last_query(&self) -> Option<(String, DeploymentId)> {
        self.state.lock().unwrap().last_query.clone()
    }
}

impl TaskStateSource for FakeTaskSource {
    async fn describe_tasks(
        &self,
        cluster: &str,
        started_by: &DeploymentId,
    ) -> Result<TaskSnapshot, OrchestrationError> {
        let mut state = self.state.lock().unwrap();
        state.last_query = Some((cluster.to_string(), started_by.clone()));
        if state.down {
            return Err(OrchestrationError::Transport("connection reset".to_string()));
        }
        Ok(state.snapshot.clone())
    }
}

pub fn request(desired_task_count: u32) -> CreateDeploymentRequest {
    let env = EnvironmentId::new("123456789012", CLUSTER, "web").unwrap();
    CreateDeploymentRequest {
        environment: EnvironmentRevision::new(env, "rev-1"),
        desired_task_count: Some(desired_task_count),
    }
}

pub fn config() -> LifecycleConfig {
    LifecycleConfig {
        storage_backoff_ms: 1,
        ..LifecycleConfig::default()
    }
}

pub fn lifecycle_with<R: DeploymentRepository>(
    repo: R,
) -> (FakeLifecycle<R>, FakeEngine, FakeTaskSource) {
    let config = config();
    let engine = FakeEngine::default();
    let source = FakeTaskSource::default();
    let lifecycle = DeploymentLifecycle::new(
        repo,
        WorkflowTrigger::new(engine.clone(), "deployment-workflow", Duration::from_secs(5)),
        TaskStatePoller::new(source.clone(), config.deployment_timeout(), Duration::from_secs(5)),
        &config,
    );
    (lifecycle, engine, source)
}

pub fn lifecycle() -> (
    FakeLifecycle<InMemoryDeploymentRepository>,
    InMemoryDeploymentRepository,
    FakeEngine,
    FakeTaskSource,
) {
    let repo = InMemoryDeploymentRepository::new();
    let (lifecycle, engine, source) = lifecycle_with(repo.clone());
    (lifecycle, repo, engine, source)
}
