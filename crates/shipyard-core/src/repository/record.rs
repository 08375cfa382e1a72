//! Storage record shape for deployments and its explicit mapping functions.
//!
//! `DeploymentRecord` is the flat, string-keyed row every store persists:
//! the deployment id is the primary key, `status` feeds the secondary
//! index, and the environment reference is flattened into the
//! `account_id_cluster_environment_name` composite key. [`to_record`] and
//! [`from_record`] are the only way between the two shapes.

use chrono::{DateTime, SecondsFormat, Utc};

use shipyard_types::deployment::{Deployment, DeploymentId, DeploymentStatus};
use shipyard_types::environment::{EnvironmentId, EnvironmentRevision};
use shipyard_types::error::RepositoryError;

/// Flat persisted form of a [`Deployment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub deployment_id: String,
    pub status: String,
    pub account_id_cluster_environment_name: String,
    /// Denormalized from the composite key so cluster lookups need no parsing.
    pub cluster_name: String,
    pub revision_id: String,
    pub desired_task_count: i64,
    pub execution_name: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub last_updated_at: String,
    pub record_version: i64,
}

/// Map a domain deployment to its storage record.
pub fn to_record(deployment: &Deployment) -> DeploymentRecord {
    let environment_id = &deployment.environment.environment_id;
    DeploymentRecord {
        deployment_id: deployment.deployment_id.to_string(),
        status: deployment.status.to_string(),
        account_id_cluster_environment_name: environment_id.account_id_cluster_environment_name(),
        cluster_name: environment_id.cluster.clone(),
        revision_id: deployment.environment.revision_id.clone(),
        desired_task_count: i64::from(deployment.desired_task_count),
        execution_name: deployment.execution_name.clone(),
        failure_reason: deployment.failure_reason.clone(),
        created_at: format_datetime(&deployment.created_at),
        last_updated_at: format_datetime(&deployment.last_updated_at),
        record_version: deployment.record_version,
    }
}

/// Map a storage record back to a domain deployment.
///
/// Fails with `RepositoryError::Corrupt` when the record cannot be decoded
/// (unparseable status, timestamps, or composite key, or a cluster column
/// that disagrees with the composite key).
pub fn from_record(record: DeploymentRecord) -> Result<Deployment, RepositoryError> {
    let deployment_id: DeploymentId = record.deployment_id.parse().map_err(corrupt)?;
    let status: DeploymentStatus = record.status.parse().map_err(corrupt)?;

    let environment_id =
        EnvironmentId::from_account_id_cluster_environment_name(&record.account_id_cluster_environment_name)
            .map_err(corrupt)?;
    if environment_id.cluster != record.cluster_name {
        return Err(corrupt(format!(
            "cluster column '{}' does not match environment key '{}'",
            record.cluster_name, record.account_id_cluster_environment_name
        )));
    }

    let desired_task_count = u32::try_from(record.desired_task_count)
        .map_err(|_| corrupt(format!("invalid desired task count: {}", record.desired_task_count)))?;

    Ok(Deployment {
        deployment_id,
        environment: EnvironmentRevision::new(environment_id, record.revision_id),
        status,
        desired_task_count,
        execution_name: record.execution_name,
        failure_reason: record.failure_reason,
        created_at: parse_datetime(&record.created_at)?,
        last_updated_at: parse_datetime(&record.last_updated_at)?,
        record_version: record.record_version,
    })
}

/// Decode listed records, skipping (and logging) those that are corrupt.
///
/// One bad row must not hide every other deployment from a listing. Point
/// reads still return `Corrupt` for it.
pub fn decode_listed(records: impl IntoIterator<Item = DeploymentRecord>) -> Vec<Deployment> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record.deployment_id.clone();
            match from_record(record) {
                Ok(deployment) => Some(deployment),
                Err(e) => {
                    tracing::error!(deployment_id = %id, error = %e, "skipping undecodable deployment record");
                    None
                }
            }
        })
        .collect()
}

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("invalid datetime '{s}': {e}")))
}

/// Fixed-width RFC 3339 (nanoseconds, `Z`), so stored timestamps sort
/// lexicographically.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn corrupt(message: String) -> RepositoryError {
    RepositoryError::Corrupt(format!("deployment record: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment() -> Deployment {
        let env = EnvironmentId::new("123456789012", "prod-east", "web").unwrap();
        let mut deployment = Deployment::new_pending(EnvironmentRevision::new(env, "rev-7"), 4);
        deployment.execution_name = Some("deployment-abc".to_string());
        deployment
    }

    #[test]
    fn test_to_record_derives_composite_key() {
        let record = to_record(&deployment());
        assert_eq!(
            record.account_id_cluster_environment_name,
            "123456789012/prod-east/web"
        );
        assert_eq!(record.cluster_name, "prod-east");
        assert_eq!(record.status, "pending");
        assert_eq!(record.desired_task_count, 4);
        assert_eq!(record.record_version, 0);
        assert!(record.created_at.ends_with('Z'));
    }

    #[test]
    fn test_record_roundtrip_preserves_fields() {
        let original = deployment();
        let restored = from_record(to_record(&original)).unwrap();

        assert_eq!(restored.deployment_id, original.deployment_id);
        assert_eq!(restored.environment, original.environment);
        assert_eq!(restored.status, original.status);
        assert_eq!(restored.execution_name, original.execution_name);
        // RFC 3339 keeps sub-second precision.
        assert_eq!(restored.created_at, original.created_at);
    }

    #[test]
    fn test_from_record_rejects_bad_status() {
        let mut record = to_record(&deployment());
        record.status = "rolling".to_string();
        let err = from_record(record).unwrap_err();
        assert!(matches!(err, RepositoryError::Corrupt(msg) if msg.contains("rolling")));
    }

    #[test]
    fn test_decode_listed_skips_corrupt_records() {
        let good = deployment();
        let mut bad = to_record(&deployment());
        bad.created_at = "yesterday".to_string();

        let decoded = decode_listed([bad, to_record(&good)]);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].deployment_id, good.deployment_id);
    }

    #[test]
    fn test_from_record_rejects_cluster_mismatch() {
        let mut record = to_record(&deployment());
        record.cluster_name = "prod-west".to_string();
        assert!(from_record(record).is_err());
    }

    #[test]
    fn test_from_record_rejects_negative_task_count() {
        let mut record = to_record(&deployment());
        record.desired_task_count = -1;
        assert!(from_record(record).is_err());
    }

    #[test]
    fn test_from_record_rejects_bad_timestamp() {
        let mut record = to_record(&deployment());
        record.last_updated_at = "yesterday".to_string();
        assert!(from_record(record).is_err());
    }
}
