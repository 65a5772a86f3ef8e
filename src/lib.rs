//! # kcp - MSK to Confluent Cloud Migration Tool
//!
//! kcp is a CLI tool and library that discovers Amazon MSK cluster state, maps it to
//! Confluent Cloud equivalents, and generates the Terraform configuration, shell
//! scripts, and connector configs needed to run a migration.
//!
//! ## Features
//!
//! - **Discovery**: Normalizes AWS discovery dumps into a versioned JSON state file
//! - **Target Planning**: Maps Kafka versions, broker fleets, and auth modes to
//!   Confluent Cloud cluster specs
//! - **Asset Generation**: Terraform/HCL, bootstrap scripts, and READMEs for bastion
//!   hosts, reverse proxies, cluster links, topic mirroring, and PrivateLink
//! - **Connector Translation**: Translates MSK Connect configs through the Confluent
//!   Cloud translation API, skipping failures without aborting the run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kcp::assets::{AssetGenerator, AssetWriter, BastionRequest};
//! use kcp::scan::ClusterScanner;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scanner = ClusterScanner::new();
//!     let state = scanner.scan(Path::new("discovery/")).await?;
//!     state.save(Path::new("kcp-state.json")).await?;
//!
//!     let generator = AssetGenerator::new();
//!     let request = BastionRequest {
//!         allowed_cidrs: vec!["10.0.0.0/8".to_string()],
//!         instance_type: "t3.micro".to_string(),
//!     };
//!     let plan = generator.generate_bastion_host(&state.clusters[0], &request, &state.region)?;
//!
//!     AssetWriter::new(true).write(&plan, Path::new("./bastion")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`scan`] - Discovery dump parsing and readiness analysis
//! - [`convert`] - MSK to Confluent Cloud target mapping
//! - [`state`] - State file and Terraform state models
//! - [`terraform`] - HCL block builders
//! - [`assets`] - Migration-type dispatch and asset generation
//! - [`connectors`] - Connector config translation
//! - [`update`] - Release checking

pub mod assets;
pub mod connectors;
pub mod convert;
pub mod scan;
pub mod state;
pub mod terraform;
pub mod update;

// Re-export commonly used types for convenience
pub use assets::{AssetGenerator, AssetPlan, AssetWriter, MigrationType};
pub use connectors::{ConnectorMigrationSummary, ConnectorMigrator, TranslateClient};
pub use convert::{convert_kafka_version, TargetPlanner, TargetSpec};
pub use scan::ClusterScanner;
pub use state::{ClusterState, MigrationState, TerraformState};
pub use update::ReleaseChecker;

/// Current version of kcp
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// kcp library error types
#[derive(thiserror::Error, Debug)]
pub enum KcpError {
    /// IO error occurred during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// HCL rendering error
    #[error("HCL rendering error: {0}")]
    Hcl(#[from] hcl::Error),

    /// Template rendering error
    #[error("Template rendering error: {0}")]
    Template(#[from] handlebars::RenderError),

    /// HTTP error talking to a remote API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Discovery or state file error
    #[error("State error: {0}")]
    State(String),

    /// Asset generation error
    #[error("Generation error: {0}")]
    Generation(String),
}

/// kcp library configuration
#[derive(Debug, Clone)]
pub struct KcpConfig {
    /// Path of the migration state file
    pub state_file: std::path::PathBuf,
    /// Default output directory root for generated assets
    pub output_dir: std::path::PathBuf,
    /// Region override for discovery
    pub region: Option<String>,
    /// Skip interactive confirmation prompts
    pub assume_yes: bool,
}

impl Default for KcpConfig {
    fn default() -> Self {
        Self {
            state_file: std::path::PathBuf::from("kcp-state.json"),
            output_dir: std::path::PathBuf::from("./kcp-assets"),
            region: None,
            assume_yes: false,
        }
    }
}

/// Main kcp client for programmatic usage
pub struct Kcp {
    config: KcpConfig,
    generator: AssetGenerator,
}

impl Kcp {
    /// Create a new kcp client with default configuration
    pub fn new() -> Self {
        Self::with_config(KcpConfig::default())
    }

    /// Create a new kcp client with custom configuration
    pub fn with_config(config: KcpConfig) -> Self {
        Self {
            config,
            generator: AssetGenerator::new(),
        }
    }

    /// Scan a discovery dump and persist the resulting state file
    pub async fn scan<P: AsRef<std::path::Path>>(
        &self,
        input: P,
    ) -> anyhow::Result<MigrationState> {
        let mut scanner = ClusterScanner::new();
        if let Some(region) = &self.config.region {
            scanner = scanner.with_region(region.clone());
        }

        let state = scanner.scan(input.as_ref()).await?;
        state.save(&self.config.state_file).await?;

        Ok(state)
    }

    /// Load the previously written state file
    pub async fn load_state(&self) -> anyhow::Result<MigrationState> {
        MigrationState::load(&self.config.state_file).await
    }

    /// Plan Confluent Cloud targets for every discovered cluster
    pub fn plan_targets(&self, state: &MigrationState) -> anyhow::Result<Vec<TargetSpec>> {
        TargetPlanner::new(state.region.clone()).plan_all(state)
    }

    /// Write an asset plan under the configured output root
    pub async fn write_plan(&self, plan: &AssetPlan) -> anyhow::Result<()> {
        let output = self.config.output_dir.join(&plan.name);
        AssetWriter::new(self.config.assume_yes)
            .write(plan, &output)
            .await
    }

    /// Access the asset generator
    pub fn generator(&self) -> &AssetGenerator {
        &self.generator
    }

    /// Get current configuration
    pub fn config(&self) -> &KcpConfig {
        &self.config
    }
}

impl Default for Kcp {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::fs;

    #[tokio::test]
    async fn test_kcp_client_scan() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let dump_file = temp_dir.path().join("discovery.json");

        let dump = r#"{
            "Region": "eu-west-1",
            "Clusters": [{
                "ClusterArn": "arn:aws:kafka:eu-west-1:111122223333:cluster/payments/uuid-1",
                "ClusterName": "payments",
                "Provisioned": {
                    "CurrentBrokerSoftwareInfo": { "KafkaVersion": "3.6.0.1" },
                    "NumberOfBrokerNodes": 3,
                    "BrokerNodeGroupInfo": {
                        "InstanceType": "kafka.m5.large",
                        "ClientSubnets": ["subnet-1"],
                        "SecurityGroups": ["sg-1"],
                        "VpcId": "vpc-1"
                    },
                    "ClientAuthentication": { "Sasl": { "Scram": { "Enabled": true } } }
                },
                "BootstrapBrokers": {
                    "BootstrapBrokerStringSaslScram": "b-1.payments.abc.kafka.eu-west-1.amazonaws.com:9096"
                }
            }]
        }"#;
        fs::write(&dump_file, dump).await?;

        let kcp = Kcp::with_config(KcpConfig {
            state_file: temp_dir.path().join("kcp-state.json"),
            assume_yes: true,
            ..Default::default()
        });

        let state = kcp.scan(&dump_file).await?;
        assert_eq!(state.region, "eu-west-1");
        assert_eq!(state.clusters.len(), 1);

        let reloaded = kcp.load_state().await?;
        assert_eq!(reloaded.clusters[0].name, "payments");

        let targets = kcp.plan_targets(&reloaded)?;
        assert_eq!(targets[0].kafka_version, "3.6.0");

        Ok(())
    }

    #[test]
    fn test_kcp_config() {
        let config = KcpConfig {
            assume_yes: true,
            region: Some("us-west-2".to_string()),
            ..Default::default()
        };

        let kcp = Kcp::with_config(config);
        assert!(kcp.config().assume_yes);
        assert_eq!(kcp.config().region.as_deref(), Some("us-west-2"));
    }
}
