use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Bumped whenever the state file layout changes incompatibly.
pub const STATE_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationState {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub region: String,
    pub clusters: Vec<ClusterState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterState {
    pub arn: String,
    pub name: String,
    pub kafka_version: String,
    pub broker_count: u32,
    pub instance_type: String,
    pub authentication: AuthenticationState,
    pub publicly_accessible: bool,
    pub networking: NetworkingState,
    pub bootstrap_brokers: BootstrapBrokers,
    pub topics: Vec<TopicState>,
    pub connectors: Vec<ConnectorState>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthenticationState {
    pub sasl_iam: bool,
    pub sasl_scram: bool,
    pub mtls: bool,
    pub unauthenticated: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkingState {
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
    pub availability_zones: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapBrokers {
    pub plaintext: Option<String>,
    pub sasl_scram: Option<String>,
    pub sasl_iam: Option<String>,
    pub tls: Option<String>,
    pub public_sasl_scram: Option<String>,
    pub public_sasl_iam: Option<String>,
    pub public_tls: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicState {
    pub name: String,
    pub partitions: u32,
    pub replication_factor: u16,
    pub configs: HashMap<String, String>,
    pub internal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorState {
    pub name: String,
    pub connector_class: String,
    pub tasks_max: u32,
    pub config: HashMap<String, String>,
}

impl MigrationState {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            version: STATE_FILE_VERSION,
            generated_at: Utc::now(),
            region: region.into(),
            clusters: Vec::new(),
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read state file {}", path.display()))?;

        let state: MigrationState =
            serde_json::from_str(&content).context("Failed to parse state file")?;
        state.validate()?;

        Ok(state)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create state file directory")?;
            }
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        tokio::fs::write(path, content + "\n")
            .await
            .with_context(|| format!("Failed to write state file {}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != STATE_FILE_VERSION {
            return Err(anyhow::anyhow!(
                "Unsupported state file version {} (expected {})",
                self.version,
                STATE_FILE_VERSION
            ));
        }

        for cluster in &self.clusters {
            cluster.validate()?;
        }

        Ok(())
    }

    pub fn find_cluster(&self, arn: &str) -> Option<&ClusterState> {
        self.clusters.iter().find(|c| c.arn == arn)
    }

    pub fn cluster_names(&self) -> Vec<&str> {
        self.clusters.iter().map(|c| c.name.as_str()).collect()
    }
}

impl ClusterState {
    pub fn validate(&self) -> Result<()> {
        if self.arn.is_empty() {
            return Err(anyhow::anyhow!("Cluster entry is missing an ARN"));
        }
        if self.name.is_empty() {
            return Err(anyhow::anyhow!("Cluster {} is missing a name", self.arn));
        }
        if self.broker_count == 0 {
            return Err(anyhow::anyhow!(
                "Cluster {} reports zero brokers",
                self.name
            ));
        }

        Ok(())
    }

    /// The bootstrap string for the preferred client auth mode, private endpoints first.
    pub fn preferred_bootstrap(&self) -> Option<&str> {
        self.bootstrap_brokers
            .sasl_scram
            .as_deref()
            .or(self.bootstrap_brokers.sasl_iam.as_deref())
            .or(self.bootstrap_brokers.tls.as_deref())
            .or(self.bootstrap_brokers.public_sasl_scram.as_deref())
            .or(self.bootstrap_brokers.public_sasl_iam.as_deref())
            .or(self.bootstrap_brokers.public_tls.as_deref())
            .or(self.bootstrap_brokers.plaintext.as_deref())
    }

    pub fn mirrorable_topics(&self, include_internal: bool) -> Vec<&TopicState> {
        self.topics
            .iter()
            .filter(|t| include_internal || !t.is_internal())
            .collect()
    }
}

impl TopicState {
    pub fn is_internal(&self) -> bool {
        self.internal || self.name.starts_with("__")
    }
}

/// Root-module outputs read from a `terraform.tfstate` produced by a prior
/// `migration-infra` or `target-infra` apply.
#[derive(Debug, Clone, Deserialize)]
pub struct TerraformState {
    #[serde(default)]
    outputs: HashMap<String, TerraformOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerraformOutput {
    pub value: serde_json::Value,
    #[serde(default)]
    pub sensitive: bool,
}

impl TerraformState {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read Terraform state {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse Terraform state")
    }

    pub fn output_str(&self, key: &str) -> Result<String> {
        self.try_output_str(key)
            .with_context(|| format!("Terraform state has no string output named `{}`", key))
    }

    pub fn try_output_str(&self, key: &str) -> Option<String> {
        self.outputs
            .get(key)
            .and_then(|o| o.value.as_str())
            .map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_cluster() -> ClusterState {
        ClusterState {
            arn: "arn:aws:kafka:us-east-1:111122223333:cluster/orders/abc-123".to_string(),
            name: "orders".to_string(),
            kafka_version: "3.6.0.1".to_string(),
            broker_count: 3,
            instance_type: "kafka.m5.large".to_string(),
            authentication: AuthenticationState {
                sasl_scram: true,
                ..Default::default()
            },
            publicly_accessible: false,
            networking: NetworkingState::default(),
            bootstrap_brokers: BootstrapBrokers {
                sasl_scram: Some("b-1.orders.abc.kafka.us-east-1.amazonaws.com:9096".to_string()),
                ..Default::default()
            },
            topics: vec![
                TopicState {
                    name: "orders.created".to_string(),
                    partitions: 6,
                    replication_factor: 3,
                    configs: HashMap::new(),
                    internal: false,
                },
                TopicState {
                    name: "__consumer_offsets".to_string(),
                    partitions: 50,
                    replication_factor: 3,
                    configs: HashMap::new(),
                    internal: true,
                },
            ],
            connectors: Vec::new(),
        }
    }

    #[test]
    fn validate_rejects_zero_brokers() {
        let mut cluster = minimal_cluster();
        cluster.broker_count = 0;
        assert!(cluster.validate().is_err());
    }

    #[test]
    fn mirrorable_topics_skip_internal_by_default() {
        let cluster = minimal_cluster();
        let topics = cluster.mirrorable_topics(false);
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].name, "orders.created");

        assert_eq!(cluster.mirrorable_topics(true).len(), 2);
    }

    #[test]
    fn preferred_bootstrap_prefers_private_scram() {
        let cluster = minimal_cluster();
        assert_eq!(
            cluster.preferred_bootstrap(),
            Some("b-1.orders.abc.kafka.us-east-1.amazonaws.com:9096")
        );
    }

    #[test]
    fn terraform_state_output_lookup() {
        let state: TerraformState = serde_json::from_str(
            r#"{
                "outputs": {
                    "cluster_id": { "value": "lkc-abc123" },
                    "kafka_api_secret": { "value": "s3cret", "sensitive": true }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(state.output_str("cluster_id").unwrap(), "lkc-abc123");
        assert_eq!(state.try_output_str("missing"), None);
        assert!(state.output_str("missing").is_err());
    }
}
