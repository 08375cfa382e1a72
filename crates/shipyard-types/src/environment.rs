//! Environment identity and revision references.
//!
//! Environments are owned by a separate collaborator. Deployments only keep
//! an immutable reference to one environment revision, so this module holds
//! identity types and the composite-key helpers used by storage indexes.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Separator used when joining identity parts into a composite key.
pub const KEY_SEPARATOR: char = '/';

/// Composite identity of an environment: account, cluster, and name.
///
/// Deserialization goes through [`EnvironmentId::new`], so a decoded id is
/// always valid. A struct literal can still bypass the checks; callers that
/// accept ids from outside re-check with [`EnvironmentId::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawEnvironmentId")]
pub struct EnvironmentId {
    pub account_id: String,
    pub cluster: String,
    pub environment_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvironmentId {
    account_id: String,
    cluster: String,
    environment_name: String,
}

impl TryFrom<RawEnvironmentId> for EnvironmentId {
    type Error = String;

    fn try_from(raw: RawEnvironmentId) -> Result<Self, Self::Error> {
        Self::new(raw.account_id, raw.cluster, raw.environment_name)
    }
}

impl EnvironmentId {
    /// Build an environment id, rejecting parts that would make the
    /// composite keys ambiguous.
    pub fn new(
        account_id: impl Into<String>,
        cluster: impl Into<String>,
        environment_name: impl Into<String>,
    ) -> Result<Self, String> {
        let id = Self {
            account_id: account_id.into(),
            cluster: cluster.into(),
            environment_name: environment_name.into(),
        };
        id.validate()?;
        Ok(id)
    }

    /// Account id and cluster must be non-empty and must not contain `/`.
    /// The environment name must be non-empty but may contain `/`, since it
    /// is always the last segment of a composite key.
    pub fn validate(&self) -> Result<(), String> {
        for (label, value) in [("account id", &self.account_id), ("cluster", &self.cluster)] {
            if value.is_empty() {
                return Err(format!("{label} cannot be empty"));
            }
            if value.contains(KEY_SEPARATOR) {
                return Err(format!("{label} '{value}' must not contain '{KEY_SEPARATOR}'"));
            }
        }
        if self.environment_name.is_empty() {
            return Err("environment name cannot be empty".to_string());
        }
        Ok(())
    }

    /// `"{account_id}/{cluster}"`, the key environments are grouped by.
    pub fn account_id_cluster(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.account_id, self.cluster)
    }

    /// `"{account_id}/{cluster}/{environment_name}"`, the key revisions are
    /// stored under.
    pub fn account_id_cluster_environment_name(&self) -> String {
        format!(
            "{}{KEY_SEPARATOR}{}",
            self.account_id_cluster(),
            self.environment_name
        )
    }

    /// Inverse of [`account_id_cluster_environment_name`](Self::account_id_cluster_environment_name).
    pub fn from_account_id_cluster_environment_name(key: &str) -> Result<Self, String> {
        let mut parts = key.splitn(3, KEY_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(account_id), Some(cluster), Some(environment_name)) => {
                Self::new(account_id, cluster, environment_name)
            }
            _ => Err(format!("malformed environment key: '{key}'")),
        }
    }

    /// Split an `account_id_cluster` key back into `(account_id, cluster)`.
    pub fn split_account_id_cluster(key: &str) -> Result<(String, String), String> {
        match key.split_once(KEY_SEPARATOR) {
            Some((account_id, cluster))
                if !account_id.is_empty()
                    && !cluster.is_empty()
                    && !cluster.contains(KEY_SEPARATOR) =>
            {
                Ok((account_id.to_string(), cluster.to_string()))
            }
            _ => Err(format!("malformed account/cluster key: '{key}'")),
        }
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.account_id_cluster_environment_name())
    }
}

/// A specific revision of an environment that a deployment rolls out.
///
/// Set once at deployment creation and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentRevision {
    pub environment_id: EnvironmentId,
    pub revision_id: String,
}

impl EnvironmentRevision {
    pub fn new(environment_id: EnvironmentId, revision_id: impl Into<String>) -> Self {
        Self {
            environment_id,
            revision_id: revision_id.into(),
        }
    }

    /// Cluster the revision is deployed to.
    pub fn cluster(&self) -> &str {
        &self.environment_id.cluster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> EnvironmentId {
        EnvironmentId::new("123456789012", "prod-east", "web").unwrap()
    }

    #[test]
    fn test_composite_keys() {
        let id = env();
        assert_eq!(id.account_id_cluster(), "123456789012/prod-east");
        assert_eq!(
            id.account_id_cluster_environment_name(),
            "123456789012/prod-east/web"
        );
    }

    #[test]
    fn test_environment_name_may_contain_separator() {
        let id = EnvironmentId::new("acct", "cluster", "team/web").unwrap();
        let key = id.account_id_cluster_environment_name();
        assert_eq!(key, "acct/cluster/team/web");

        let parsed = EnvironmentId::from_account_id_cluster_environment_name(&key).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_rejects_separator_in_cluster() {
        let err = EnvironmentId::new("acct", "a/b", "web").unwrap_err();
        assert!(err.contains("cluster"));
    }

    #[test]
    fn test_rejects_empty_parts() {
        assert!(EnvironmentId::new("", "c", "e").is_err());
        assert!(EnvironmentId::new("a", "", "e").is_err());
        assert!(EnvironmentId::new("a", "c", "").is_err());
    }

    #[test]
    fn test_deserialize_validates_parts() {
        let id: EnvironmentId = serde_json::from_str(
            r#"{"accountId":"acct","cluster":"prod-east","environmentName":"team/web"}"#,
        )
        .unwrap();
        assert_eq!(id.environment_name, "team/web");

        let err = serde_json::from_str::<EnvironmentId>(
            r#"{"accountId":"acct","cluster":"a/b","environmentName":"web"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cluster 'a/b'"));
    }

    #[test]
    fn test_validate_catches_struct_literal() {
        let id = EnvironmentId {
            account_id: "acct".to_string(),
            cluster: String::new(),
            environment_name: "web".to_string(),
        };
        assert_eq!(id.validate().unwrap_err(), "cluster cannot be empty");
    }

    #[test]
    fn test_malformed_keys() {
        assert!(EnvironmentId::from_account_id_cluster_environment_name("only/two").is_err());
        assert!(EnvironmentId::split_account_id_cluster("nocluster").is_err());
        assert!(EnvironmentId::split_account_id_cluster("a/b/c").is_err());
    }

    #[test]
    fn test_split_account_id_cluster() {
        let (account, cluster) =
            EnvironmentId::split_account_id_cluster(&env().account_id_cluster()).unwrap();
        assert_eq!(account, "123456789012");
        assert_eq!(cluster, "prod-east");
    }
}
