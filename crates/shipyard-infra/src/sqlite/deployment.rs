//! SQLite deployment repository implementation.
//!
//! Implements `DeploymentRepository` from `shipyard-core` using sqlx with
//! split read/write pools. Every update is conditional on the record
//! version it was computed from.

use shipyard_core::repository::deployment::DeploymentRepository;
use shipyard_core::repository::record::{DeploymentRecord, decode_listed, from_record, to_record};
use shipyard_types::deployment::{Deployment, DeploymentId, DeploymentStatus, DeploymentUpdate};
use shipyard_types::error::RepositoryError;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `DeploymentRepository`.
pub struct SqliteDeploymentRepository {
    pool: DatabasePool,
}

impl SqliteDeploymentRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn fetch_record(
        &self,
        executor: &sqlx::SqlitePool,
        id: &str,
    ) -> Result<Option<DeploymentRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM deployments WHERE deployment_id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(storage)?;

        row.as_ref().map(record_from_row).transpose().map_err(corrupt)
    }

    async fn fetch_many(&self, sql: &str, status: Option<&str>) -> Result<Vec<Deployment>, RepositoryError> {
        let mut query = sqlx::query(sql);
        if let Some(status) = status {
            query = query.bind(status);
        }
        let rows = query.fetch_all(&self.pool.reader).await.map_err(storage)?;

        let records = rows.iter().filter_map(|row| match record_from_row(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::error!(error = %e, "skipping unreadable deployment row");
                None
            }
        });
        Ok(decode_listed(records))
    }
}

fn record_from_row(row: &SqliteRow) -> Result<DeploymentRecord, sqlx::Error> {
    Ok(DeploymentRecord {
        deployment_id: row.try_get("deployment_id")?,
        status: row.try_get("status")?,
        account_id_cluster_environment_name: row.try_get("account_id_cluster_environment_name")?,
        cluster_name: row.try_get("cluster_name")?,
        revision_id: row.try_get("revision_id")?,
        desired_task_count: row.try_get("desired_task_count")?,
        execution_name: row.try_get("execution_name")?,
        failure_reason: row.try_get("failure_reason")?,
        created_at: row.try_get("created_at")?,
        last_updated_at: row.try_get("last_updated_at")?,
        record_version: row.try_get("record_version")?,
    })
}

fn storage(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

/// A row whose columns do not decode reads the same way every time.
fn corrupt(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Corrupt(format!("deployment row: {e}"))
}

impl DeploymentRepository for SqliteDeploymentRepository {
    async fn create(&self, deployment: &Deployment) -> Result<Deployment, RepositoryError> {
        let mut stored = deployment.clone();
        stored.record_version = 0;
        stored.last_updated_at = Utc::now();
        let record = to_record(&stored);

        let result = sqlx::query(
            "INSERT INTO deployments (deployment_id, status, account_id_cluster_environment_name, cluster_name, revision_id, desired_task_count, execution_name, failure_reason, created_at, last_updated_at, record_version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.deployment_id)
        .bind(&record.status)
        .bind(&record.account_id_cluster_environment_name)
        .bind(&record.cluster_name)
        .bind(&record.revision_id)
        .bind(record.desired_task_count)
        .bind(&record.execution_name)
        .bind(&record.failure_reason)
        .bind(&record.created_at)
        .bind(&record.last_updated_at)
        .bind(record.record_version)
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(stored),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                Err(RepositoryError::Duplicate(format!(
                    "deployment '{}' already exists",
                    record.deployment_id
                )))
            }
            Err(e) => Err(storage(e)),
        }
    }

    async fn update(&self, update: &DeploymentUpdate) -> Result<Deployment, RepositoryError> {
        let id = update.deployment_id.as_str();
        let current = self
            .fetch_record(&self.pool.writer, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let loaded_version = current.record_version;

        if let Some(expected) = update.expected_version {
            if expected != loaded_version {
                return Err(RepositoryError::VersionConflict {
                    expected,
                    actual: loaded_version,
                });
            }
        }

        let mut deployment = from_record(current)?;
        update.apply_to(&mut deployment);
        deployment.record_version = loaded_version + 1;
        deployment.last_updated_at = Utc::now();
        let record = to_record(&deployment);

        let result = sqlx::query(
            "UPDATE deployments SET status = ?, execution_name = ?, failure_reason = ?, last_updated_at = ?, record_version = ?
             WHERE deployment_id = ? AND record_version = ?",
        )
        .bind(&record.status)
        .bind(&record.execution_name)
        .bind(&record.failure_reason)
        .bind(&record.last_updated_at)
        .bind(record.record_version)
        .bind(id)
        .bind(loaded_version)
        .execute(&self.pool.writer)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            // Lost the race between load and write.
            return match self.fetch_record(&self.pool.writer, id).await? {
                Some(now) => Err(RepositoryError::VersionConflict {
                    expected: loaded_version,
                    actual: now.record_version,
                }),
                None => Err(RepositoryError::NotFound),
            };
        }

        Ok(deployment)
    }

    async fn get_by_id(&self, id: &DeploymentId) -> Result<Deployment, RepositoryError> {
        let record = self
            .fetch_record(&self.pool.reader, id.as_str())
            .await?
            .ok_or(RepositoryError::NotFound)?;
        from_record(record)
    }

    async fn list_by_status(
        &self,
        status: DeploymentStatus,
    ) -> Result<Vec<Deployment>, RepositoryError> {
        self.fetch_many(
            "SELECT * FROM deployments WHERE status = ? ORDER BY created_at, deployment_id",
            Some(&status.to_string()),
        )
        .await
    }

    async fn list_ids_by_status(
        &self,
        status: DeploymentStatus,
    ) -> Result<Vec<DeploymentId>, RepositoryError> {
        let ids: Vec<(String,)> = sqlx::query_as(
            "SELECT deployment_id FROM deployments WHERE status = ? ORDER BY created_at, deployment_id",
        )
        .bind(status.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(storage)?;

        Ok(ids.into_iter().filter_map(|(id,)| id.parse().ok()).collect())
    }

    async fn list_all(&self) -> Result<Vec<Deployment>, RepositoryError> {
        self.fetch_many(
            "SELECT * FROM deployments ORDER BY created_at, deployment_id",
            None,
        )
        .await
    }

    async fn delete_all(&self) -> Result<usize, RepositoryError> {
        let ids: Vec<(String,)> = sqlx::query_as("SELECT deployment_id FROM deployments")
            .fetch_all(&self.pool.writer)
            .await
            .map_err(storage)?;

        let attempted = ids.len();
        let mut deleted = 0;
        let mut failed = 0;

        for (id,) in ids {
            match sqlx::query("DELETE FROM deployments WHERE deployment_id = ?")
                .bind(&id)
                .execute(&self.pool.writer)
                .await
            {
                Ok(result) => deleted += result.rows_affected() as usize,
                Err(e) => {
                    tracing::warn!(deployment_id = %id, error = %e, "failed to delete deployment");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(RepositoryError::PartialFailure { attempted, failed });
        }
        Ok(deleted)
    }
}
