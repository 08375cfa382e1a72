//! Configuration types for Shipyard.
//!
//! `ShipyardConfig` represents the top-level `config.toml` that points the
//! lifecycle manager at its collaborators and tunes its timeouts and retry
//! budgets.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.shipyard/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipyardConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

/// Workflow engine connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_workflow_endpoint")]
    pub endpoint: String,
    /// Pre-provisioned state machine every execution runs.
    #[serde(default = "default_state_machine_id")]
    pub state_machine_id: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_workflow_endpoint() -> String {
    "http://127.0.0.1:8700".to_string()
}

fn default_state_machine_id() -> String {
    "deployment-workflow".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            endpoint: default_workflow_endpoint(),
            state_machine_id: default_state_machine_id(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl WorkflowConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Container-orchestration API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    #[serde(default = "default_orchestration_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_orchestration_endpoint() -> String {
    "http://127.0.0.1:8701".to_string()
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_orchestration_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl OrchestrationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Lifecycle manager tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// In-progress deployments older than this are failed as timed out.
    #[serde(default = "default_deployment_timeout_secs")]
    pub deployment_timeout_secs: u64,
    /// Attempts per storage call before a storage failure is surfaced.
    #[serde(default = "default_storage_max_attempts")]
    pub storage_max_attempts: u32,
    /// Base delay of the exponential storage backoff.
    #[serde(default = "default_storage_backoff_ms")]
    pub storage_backoff_ms: u64,
    /// Reload-and-retry budget when a transition loses a version race.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

fn default_deployment_timeout_secs() -> u64 {
    1800
}

fn default_storage_max_attempts() -> u32 {
    3
}

fn default_storage_backoff_ms() -> u64 {
    100
}

fn default_max_conflict_retries() -> u32 {
    3
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            deployment_timeout_secs: default_deployment_timeout_secs(),
            storage_max_attempts: default_storage_max_attempts(),
            storage_backoff_ms: default_storage_backoff_ms(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

impl LifecycleConfig {
    pub fn deployment_timeout(&self) -> Duration {
        Duration::from_secs(self.deployment_timeout_secs)
    }

    pub fn storage_backoff(&self) -> Duration {
        Duration::from_millis(self.storage_backoff_ms)
    }
}
