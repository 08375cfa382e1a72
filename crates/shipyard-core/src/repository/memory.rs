//! In-memory deployment repository.
//!
//! Keeps a primary table and a separate status index, both holding
//! [`DeploymentRecord`]s. With [`IndexPropagation::Manual`] the index only
//! catches up when [`InMemoryDeploymentRepository::propagate_index`] is
//! called, which is how tests model the eventual consistency of a real
//! secondary index. Also supports injecting storage failures.
//!
//! Cloning produces a shared view (backed by `Arc<Mutex<...>>`).

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use shipyard_types::deployment::{Deployment, DeploymentId, DeploymentStatus, DeploymentUpdate};
use shipyard_types::error::RepositoryError;

use super::deployment::DeploymentRepository;
use super::record::{DeploymentRecord, decode_listed, from_record, to_record};

/// When writes become visible to index reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexPropagation {
    /// Index reads see every write immediately.
    #[default]
    Immediate,
    /// Index reads see writes only after `propagate_index()`.
    Manual,
}

#[derive(Default)]
struct Inner {
    table: BTreeMap<String, DeploymentRecord>,
    status_index: BTreeMap<String, DeploymentRecord>,
    propagation: IndexPropagation,
    injected_failures: u32,
    failing_deletes: HashSet<String>,
}

impl Inner {
    fn put(&mut self, record: DeploymentRecord) {
        if self.propagation == IndexPropagation::Immediate {
            self.status_index
                .insert(record.deployment_id.clone(), record.clone());
        }
        self.table.insert(record.deployment_id.clone(), record);
    }

    fn remove(&mut self, id: &str) {
        self.table.remove(id);
        if self.propagation == IndexPropagation::Immediate {
            self.status_index.remove(id);
        }
    }

    fn check_injected_failure(&mut self) -> Result<(), RepositoryError> {
        if self.injected_failures > 0 {
            self.injected_failures -= 1;
            return Err(RepositoryError::Storage("injected storage failure".to_string()));
        }
        Ok(())
    }
}

/// In-memory implementation of `DeploymentRepository`.
#[derive(Clone, Default)]
pub struct InMemoryDeploymentRepository {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryDeploymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository whose status index lags until `propagate_index()`.
    pub fn with_manual_index() -> Self {
        let repo = Self::default();
        repo.lock().propagation = IndexPropagation::Manual;
        repo
    }

    /// Bring the status index up to date with the primary table.
    pub fn propagate_index(&self) {
        let mut inner = self.lock();
        inner.status_index = inner.table.clone();
    }

    /// Make the next `count` operations fail with a storage error.
    pub fn fail_next(&self, count: u32) {
        self.lock().injected_failures = count;
    }

    /// Make `delete_all` fail to delete this deployment.
    pub fn fail_delete_of(&self, id: &DeploymentId) {
        self.lock().failing_deletes.insert(id.to_string());
    }

    /// Store a record as is, without going through the domain mapping.
    pub fn insert_record(&self, record: DeploymentRecord) {
        self.lock().put(record);
    }

    /// Number of records in the primary table.
    pub fn len(&self) -> usize {
        self.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeploymentRepository for InMemoryDeploymentRepository {
    async fn create(&self, deployment: &Deployment) -> Result<Deployment, RepositoryError> {
        let mut inner = self.lock();
        inner.check_injected_failure()?;

        let id = deployment.deployment_id.to_string();
        if inner.table.contains_key(&id) {
            return Err(RepositoryError::Duplicate(format!("deployment '{id}' already exists")));
        }

        let mut stored = deployment.clone();
        stored.record_version = 0;
        stored.last_updated_at = Utc::now();

        inner.put(to_record(&stored));
        Ok(stored)
    }

    async fn update(&self, update: &DeploymentUpdate) -> Result<Deployment, RepositoryError> {
        let mut inner = self.lock();
        inner.check_injected_failure()?;

        let current = inner
            .table
            .get(update.deployment_id.as_str())
            .cloned()
            .ok_or(RepositoryError::NotFound)?;

        if let Some(expected) = update.expected_version {
            if expected != current.record_version {
                return Err(RepositoryError::VersionConflict {
                    expected,
                    actual: current.record_version,
                });
            }
        }

        let mut deployment = from_record(current)?;
        update.apply_to(&mut deployment);
        deployment.record_version += 1;
        deployment.last_updated_at = Utc::now();

        inner.put(to_record(&deployment));
        Ok(deployment)
    }

    async fn get_by_id(&self, id: &DeploymentId) -> Result<Deployment, RepositoryError> {
        let mut inner = self.lock();
        inner.check_injected_failure()?;

        let record = inner
            .table
            .get(id.as_str())
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        from_record(record)
    }

    async fn list_by_status(
        &self,
        status: DeploymentStatus,
    ) -> Result<Vec<Deployment>, RepositoryError> {
        let mut inner = self.lock();
        inner.check_injected_failure()?;

        let status = status.to_string();
        Ok(decode_listed(
            inner
                .status_index
                .values()
                .filter(|record| record.status == status)
                .cloned(),
        ))
    }

    async fn list_ids_by_status(
        &self,
        status: DeploymentStatus,
    ) -> Result<Vec<DeploymentId>, RepositoryError> {
        let mut inner = self.lock();
        inner.check_injected_failure()?;

        let status = status.to_string();
        Ok(inner
            .status_index
            .values()
            .filter(|record| record.status == status)
            .filter_map(|record| record.deployment_id.parse().ok())
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Deployment>, RepositoryError> {
        let mut inner = self.lock();
        inner.check_injected_failure()?;

        Ok(decode_listed(inner.status_index.values().cloned()))
    }

    async fn delete_all(&self) -> Result<usize, RepositoryError> {
        let mut inner = self.lock();
        inner.check_injected_failure()?;

        let ids: Vec<String> = inner.table.keys().cloned().collect();
        let attempted = ids.len();
        let mut failed = 0;

        for id in ids {
            if inner.failing_deletes.contains(&id) {
                failed += 1;
                continue;
            }
            inner.remove(&id);
        }

        if failed > 0 {
            return Err(RepositoryError::PartialFailure { attempted, failed });
        }
        Ok(attempted)
    }
}
