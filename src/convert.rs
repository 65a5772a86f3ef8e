use anyhow::{Context, Result};
use colored::*;
use serde::{Deserialize, Serialize};

use crate::state::{ClusterState, MigrationState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub cluster_name: String,
    pub source_arn: String,
    pub source_kafka_version: String,
    pub kafka_version: String,
    pub cluster_type: ConfluentClusterType,
    pub availability: Availability,
    pub auth_recommendation: AuthRecommendation,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfluentClusterType {
    Basic,
    Standard,
    Dedicated { cku: u32 },
}

impl ConfluentClusterType {
    pub fn label(&self) -> String {
        match self {
            ConfluentClusterType::Basic => "Basic".to_string(),
            ConfluentClusterType::Standard => "Standard".to_string(),
            ConfluentClusterType::Dedicated { cku } => format!("Dedicated ({} CKU)", cku),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    SingleZone,
    MultiZone,
}

impl Availability {
    pub fn as_terraform(&self) -> &'static str {
        match self {
            Availability::SingleZone => "SINGLE_ZONE",
            Availability::MultiZone => "MULTI_ZONE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthRecommendation {
    ApiKey,
    OauthFederation,
    MutualTls,
}

impl AuthRecommendation {
    pub fn describe(&self) -> &'static str {
        match self {
            AuthRecommendation::ApiKey => "API keys (replaces SASL/SCRAM credentials)",
            AuthRecommendation::OauthFederation => {
                "OAuth identity federation (replaces IAM client authentication)"
            }
            AuthRecommendation::MutualTls => "Mutual TLS with uploaded certificate authority",
        }
    }
}

/// Normalizes an MSK Kafka version string to the `major.minor.patch` form Confluent
/// Cloud understands. MSK appends build suffixes (`3.6.0.1`) and non-numeric markers
/// (`4.0.x.kraft`); anything past the third component is dropped and non-numeric
/// components become `0`.
pub fn convert_kafka_version(version: &str) -> Result<String> {
    let trimmed = version.trim();
    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("Kafka version string is empty"));
    }

    let mut components = trimmed.split('.');
    let major = components.next().unwrap_or_default();
    if major.is_empty() || !major.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow::anyhow!(
            "Kafka version `{}` does not start with a numeric major version",
            version
        ));
    }

    let mut parts = vec![major.to_string()];
    for component in components.take(2) {
        if !component.is_empty() && component.chars().all(|c| c.is_ascii_digit()) {
            parts.push(component.to_string());
        } else {
            parts.push("0".to_string());
        }
    }
    while parts.len() < 3 {
        parts.push("0".to_string());
    }

    Ok(parts.join("."))
}

/// Maps MSK cluster facts to the Confluent Cloud cluster that should receive them.
pub struct TargetPlanner {
    region: String,
}

impl TargetPlanner {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn plan(&self, cluster: &ClusterState) -> Result<TargetSpec> {
        let kafka_version = convert_kafka_version(&cluster.kafka_version).with_context(|| {
            format!("Cluster {} has an unusable Kafka version", cluster.name)
        })?;

        let cluster_type = self.size_cluster(cluster);
        let availability = if cluster.networking.availability_zones.len() > 1 {
            Availability::MultiZone
        } else {
            Availability::SingleZone
        };

        let mut notes = Vec::new();
        let auth_recommendation = self.map_authentication(cluster, &mut notes);

        if cluster.topics.iter().any(|t| t.replication_factor < 3) {
            notes.push(
                "Topics with replication factor below 3 will be created with factor 3 on Confluent Cloud".to_string(),
            );
        }
        if !cluster.publicly_accessible {
            notes.push(
                "Cluster is private; migration traffic needs a jump cluster or PrivateLink".to_string(),
            );
        }

        Ok(TargetSpec {
            cluster_name: cluster.name.clone(),
            source_arn: cluster.arn.clone(),
            source_kafka_version: cluster.kafka_version.clone(),
            kafka_version,
            cluster_type,
            availability,
            auth_recommendation,
            notes,
        })
    }

    pub fn plan_all(&self, state: &MigrationState) -> Result<Vec<TargetSpec>> {
        state.clusters.iter().map(|c| self.plan(c)).collect()
    }

    fn size_cluster(&self, cluster: &ClusterState) -> ConfluentClusterType {
        let weight = instance_weight(&cluster.instance_type);

        if cluster.instance_type.contains(".t3.") && cluster.broker_count <= 3 {
            return ConfluentClusterType::Basic;
        }
        if weight <= 1 && cluster.broker_count <= 3 {
            return ConfluentClusterType::Standard;
        }

        let capacity = cluster.broker_count * weight;
        let cku = (capacity / 2).max(2);
        ConfluentClusterType::Dedicated { cku }
    }

    fn map_authentication(
        &self,
        cluster: &ClusterState,
        notes: &mut Vec<String>,
    ) -> AuthRecommendation {
        if cluster.authentication.unauthenticated {
            notes.push(
                "Unauthenticated access is enabled on the source; Confluent Cloud requires authenticated clients".to_string(),
            );
        }

        if cluster.authentication.sasl_scram {
            AuthRecommendation::ApiKey
        } else if cluster.authentication.sasl_iam {
            AuthRecommendation::OauthFederation
        } else if cluster.authentication.mtls {
            AuthRecommendation::MutualTls
        } else {
            notes.push(
                "No client authentication configured on the source; defaulting to API keys".to_string(),
            );
            AuthRecommendation::ApiKey
        }
    }

    pub fn print_target_summary(&self, specs: &[TargetSpec]) {
        println!("{}", "Confluent Cloud target plan".bold().blue());
        println!("Region: {}", self.region.yellow());
        println!();

        for spec in specs {
            println!("{} {}", "•".blue(), spec.cluster_name.bold());
            println!(
                "    Kafka version: {} {} {}",
                spec.source_kafka_version.yellow(),
                "→".dimmed(),
                spec.kafka_version.green()
            );
            println!("    Cluster type: {}", spec.cluster_type.label().cyan());
            println!(
                "    Availability: {}",
                format!("{:?}", spec.availability).cyan()
            );
            println!(
                "    Authentication: {}",
                spec.auth_recommendation.describe().magenta()
            );
            for note in &spec.notes {
                println!("    {} {}", "!".yellow(), note);
            }
            println!();
        }
    }
}

fn instance_weight(instance_type: &str) -> u32 {
    let size = instance_type.rsplit('.').next().unwrap_or_default();
    match size {
        "small" | "medium" | "large" => 1,
        "xlarge" => 2,
        "2xlarge" => 4,
        "4xlarge" => 8,
        "8xlarge" => 16,
        "12xlarge" => 24,
        "16xlarge" => 32,
        "24xlarge" => 48,
        _ => 1,
    }
}
