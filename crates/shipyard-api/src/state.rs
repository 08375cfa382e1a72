//! Application state wiring the lifecycle manager to concrete collaborators.
//!
//! `DeploymentLifecycle` is generic over its ports; AppState pins it to the
//! SQLite store and the HTTP clients.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

use shipyard_core::lifecycle::manager::DeploymentLifecycle;
use shipyard_core::orchestration::poller::TaskStatePoller;
use shipyard_core::workflow::trigger::WorkflowTrigger;
use shipyard_infra::config::{load_config, resolve_data_dir};
use shipyard_infra::orchestration::http::HttpTaskStateSource;
use shipyard_infra::sqlite::deployment::SqliteDeploymentRepository;
use shipyard_infra::sqlite::pool::{default_database_url, DatabasePool};
use shipyard_infra::workflow::http::HttpWorkflowEngine;
use shipyard_types::config::ShipyardConfig;

/// Bearer token for the workflow engine, if it requires one.
const WORKFLOW_TOKEN_ENV: &str = "SHIPYARD_WORKFLOW_TOKEN";

/// Concrete lifecycle pinned to infra implementations.
pub type ConcreteLifecycle =
    DeploymentLifecycle<SqliteDeploymentRepository, HttpWorkflowEngine, HttpTaskStateSource>;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<ConcreteLifecycle>,
    pub config: ShipyardConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load config, open the database, and wire the lifecycle manager.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;

        let pool = DatabasePool::new(&default_database_url()).await?;

        let mut engine = HttpWorkflowEngine::new(
            &config.workflow.endpoint,
            config.workflow.request_timeout(),
        )?;
        if let Ok(token) = std::env::var(WORKFLOW_TOKEN_ENV) {
            engine = engine.with_token(SecretString::from(token));
        }

        let source = HttpTaskStateSource::new(
            &config.orchestration.endpoint,
            config.orchestration.request_timeout(),
        )?;

        let lifecycle = DeploymentLifecycle::new(
            SqliteDeploymentRepository::new(pool),
            WorkflowTrigger::new(
                engine,
                config.workflow.state_machine_id.clone(),
                config.workflow.request_timeout(),
            ),
            TaskStatePoller::new(
                source,
                config.lifecycle.deployment_timeout(),
                config.orchestration.request_timeout(),
            ),
            &config.lifecycle,
        );

        tracing::debug!(data_dir = %data_dir.display(), "application state initialized");

        Ok(Self {
            lifecycle: Arc::new(lifecycle),
            config,
            data_dir,
        })
    }
}
