//! Deployment repository trait definition.

use shipyard_types::deployment::{Deployment, DeploymentId, DeploymentStatus, DeploymentUpdate};
use shipyard_types::error::RepositoryError;

/// Repository trait for deployment persistence.
///
/// The store exclusively owns the canonical deployment record. It assigns
/// `record_version` (0 on create, +1 per update) and `last_updated_at`.
///
/// Implementations live in shipyard-infra (e.g., SqliteDeploymentRepository)
/// and in [`super::memory`].
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait DeploymentRepository: Send + Sync {
    /// Persist a new deployment with `record_version = 0`.
    ///
    /// Fails with `Duplicate` if the id already exists.
    fn create(
        &self,
        deployment: &Deployment,
    ) -> impl std::future::Future<Output = Result<Deployment, RepositoryError>> + Send;

    /// Merge the set fields of `update` onto the stored record and bump its
    /// version.
    ///
    /// Fails with `NotFound` for an unknown id and with `VersionConflict`
    /// when `expected_version` is stale or a concurrent write won the race.
    fn update(
        &self,
        update: &DeploymentUpdate,
    ) -> impl std::future::Future<Output = Result<Deployment, RepositoryError>> + Send;

    /// Point lookup by id. Fails with `NotFound`.
    fn get_by_id(
        &self,
        id: &DeploymentId,
    ) -> impl std::future::Future<Output = Result<Deployment, RepositoryError>> + Send;

    /// All deployments with the given status, read from the status index.
    ///
    /// Eventually consistent: results may lag the latest write, so callers
    /// re-check by id before acting. Records that no longer decode are
    /// skipped and logged.
    fn list_by_status(
        &self,
        status: DeploymentStatus,
    ) -> impl std::future::Future<Output = Result<Vec<Deployment>, RepositoryError>> + Send;

    /// Ids of the deployments with the given status, read from the status
    /// index. Record bodies are not decoded, so a corrupt record still
    /// appears here and fails on its own point read.
    fn list_ids_by_status(
        &self,
        status: DeploymentStatus,
    ) -> impl std::future::Future<Output = Result<Vec<DeploymentId>, RepositoryError>> + Send;

    /// Full scan of the status index. For audit and reconciliation only.
    /// Skips undecodable records like `list_by_status`.
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Deployment>, RepositoryError>> + Send;

    /// Delete every deployment. Returns the number deleted.
    ///
    /// Best effort, not atomic: per-item failures are aggregated into a
    /// single `PartialFailure`.
    fn delete_all(&self) -> impl std::future::Future<Output = Result<usize, RepositoryError>> + Send;
}
