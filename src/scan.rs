use anyhow::{Context, Result};
use colored::*;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::assets::MigrationType;
use crate::convert::convert_kafka_version;
use crate::state::{
    AuthenticationState, BootstrapBrokers, ClusterState, ConnectorState, MigrationState,
    NetworkingState, TopicState,
};

/// One discovery dump file: the AWS-CLI-shaped MSK payloads an operator exports
/// before running `kcp scan`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DiscoveryDump {
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    clusters: Vec<ClusterDump>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ClusterDump {
    cluster_arn: String,
    cluster_name: String,
    #[serde(default)]
    provisioned: Option<ProvisionedDump>,
    #[serde(default)]
    bootstrap_brokers: Option<BootstrapBrokersDump>,
    #[serde(default)]
    topics: Vec<TopicDump>,
    #[serde(default)]
    connectors: Vec<ConnectorDump>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProvisionedDump {
    #[serde(default)]
    current_broker_software_info: Option<BrokerSoftwareDump>,
    #[serde(default)]
    number_of_broker_nodes: u32,
    #[serde(default)]
    broker_node_group_info: Option<BrokerNodeGroupDump>,
    #[serde(default)]
    client_authentication: Option<ClientAuthenticationDump>,
    #[serde(default)]
    connectivity_info: Option<ConnectivityDump>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BrokerSoftwareDump {
    #[serde(default)]
    kafka_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BrokerNodeGroupDump {
    #[serde(default)]
    instance_type: Option<String>,
    #[serde(default)]
    client_subnets: Vec<String>,
    #[serde(default)]
    security_groups: Vec<String>,
    #[serde(default)]
    zone_ids: Vec<String>,
    #[serde(default)]
    vpc_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ClientAuthenticationDump {
    #[serde(default)]
    sasl: Option<SaslDump>,
    #[serde(default)]
    tls: Option<EnabledFlag>,
    #[serde(default)]
    unauthenticated: Option<EnabledFlag>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SaslDump {
    #[serde(default)]
    scram: Option<EnabledFlag>,
    #[serde(default)]
    iam: Option<EnabledFlag>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnabledFlag {
    #[serde(default)]
    enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConnectivityDump {
    #[serde(default)]
    public_access: Option<PublicAccessDump>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PublicAccessDump {
    #[serde(default)]
    r#type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BootstrapBrokersDump {
    #[serde(default)]
    bootstrap_broker_string: Option<String>,
    #[serde(default)]
    bootstrap_broker_string_sasl_scram: Option<String>,
    #[serde(default)]
    bootstrap_broker_string_sasl_iam: Option<String>,
    #[serde(default)]
    bootstrap_broker_string_tls: Option<String>,
    #[serde(default)]
    bootstrap_broker_string_public_sasl_scram: Option<String>,
    #[serde(default)]
    bootstrap_broker_string_public_sasl_iam: Option<String>,
    #[serde(default)]
    bootstrap_broker_string_public_tls: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TopicDump {
    name: String,
    #[serde(default = "default_partitions")]
    partitions: u32,
    #[serde(default = "default_replication")]
    replication_factor: u16,
    #[serde(default)]
    configs: HashMap<String, String>,
    #[serde(default)]
    internal: bool,
}

fn default_partitions() -> u32 {
    1
}

fn default_replication() -> u16 {
    3
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConnectorDump {
    connector_name: String,
    #[serde(default)]
    connector_configuration: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingSeverity {
    Info,
    Warning,
    Blocker,
}

#[derive(Debug, Clone)]
pub struct ReadinessFinding {
    pub severity: FindingSeverity,
    pub message: String,
}

pub struct ClusterScanner {
    region_override: Option<String>,
    arn_region: Regex,
}

impl Default for ClusterScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterScanner {
    pub fn new() -> Self {
        Self {
            region_override: None,
            arn_region: Regex::new(r"^arn:aws:kafka:([a-z0-9-]+):").unwrap(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region_override = Some(region.into());
        self
    }

    /// Normalizes a discovery dump (a JSON file, or a directory of them) into a
    /// migration state snapshot.
    pub async fn scan(&self, input: &Path) -> Result<MigrationState> {
        let files = self.collect_dump_files(input)?;
        if files.is_empty() {
            return Err(anyhow::anyhow!(
                "No JSON discovery dumps found under {}",
                input.display()
            ));
        }

        let mut region = self.region_override.clone();
        let mut clusters = Vec::new();

        for file in &files {
            let content = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("Failed to read discovery dump {}", file.display()))?;

            let dump: DiscoveryDump = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse discovery dump {}", file.display()))?;

            if region.is_none() {
                region = dump.region.clone();
            }

            for cluster_dump in dump.clusters {
                if region.is_none() {
                    region = self.region_from_arn(&cluster_dump.cluster_arn);
                }
                let cluster = self.normalize_cluster(cluster_dump)?;
                log::debug!("Discovered cluster {} ({})", cluster.name, cluster.arn);
                clusters.push(cluster);
            }
        }

        let region =
            region.context("Could not determine AWS region; pass --region explicitly")?;

        let mut state = MigrationState::new(region);
        state.clusters = clusters;
        state.validate()?;

        Ok(state)
    }

    fn collect_dump_files(&self, input: &Path) -> Result<Vec<PathBuf>> {
        if input.is_file() {
            return Ok(vec![input.to_path_buf()]);
        }
        if !input.is_dir() {
            return Err(anyhow::anyhow!(
                "Discovery input {} does not exist",
                input.display()
            ));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(input)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        Ok(files)
    }

    fn region_from_arn(&self, arn: &str) -> Option<String> {
        self.arn_region
            .captures(arn)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn normalize_cluster(&self, dump: ClusterDump) -> Result<ClusterState> {
        let provisioned = dump.provisioned.with_context(|| {
            format!(
                "Cluster {} has no provisioned section; serverless clusters are not supported",
                dump.cluster_name
            )
        })?;

        let kafka_version = provisioned
            .current_broker_software_info
            .and_then(|info| info.kafka_version)
            .unwrap_or_default();

        let node_group = provisioned.broker_node_group_info.unwrap_or(
            BrokerNodeGroupDump {
                instance_type: None,
                client_subnets: Vec::new(),
                security_groups: Vec::new(),
                zone_ids: Vec::new(),
                vpc_id: None,
            },
        );

        let authentication = Self::normalize_authentication(
            provisioned.client_authentication.unwrap_or_default(),
        );

        let publicly_accessible = provisioned
            .connectivity_info
            .and_then(|c| c.public_access)
            .and_then(|p| p.r#type)
            .map(|t| t != "DISABLED")
            .unwrap_or(false);

        let brokers = dump.bootstrap_brokers.unwrap_or_default();
        let bootstrap_brokers = BootstrapBrokers {
            plaintext: brokers.bootstrap_broker_string,
            sasl_scram: brokers.bootstrap_broker_string_sasl_scram,
            sasl_iam: brokers.bootstrap_broker_string_sasl_iam,
            tls: brokers.bootstrap_broker_string_tls,
            public_sasl_scram: brokers.bootstrap_broker_string_public_sasl_scram,
            public_sasl_iam: brokers.bootstrap_broker_string_public_sasl_iam,
            public_tls: brokers.bootstrap_broker_string_public_tls,
        };

        let topics = dump
            .topics
            .into_iter()
            .map(|t| TopicState {
                name: t.name,
                partitions: t.partitions,
                replication_factor: t.replication_factor,
                configs: t.configs,
                internal: t.internal,
            })
            .collect();

        let connectors = dump
            .connectors
            .into_iter()
            .map(|c| {
                let connector_class = c
                    .connector_configuration
                    .get("connector.class")
                    .cloned()
                    .unwrap_or_default();
                let tasks_max = c
                    .connector_configuration
                    .get("tasks.max")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1);
                ConnectorState {
                    name: c.connector_name,
                    connector_class,
                    tasks_max,
                    config: c.connector_configuration,
                }
            })
            .collect();

        let cluster = ClusterState {
            arn: dump.cluster_arn,
            name: dump.cluster_name,
            kafka_version,
            broker_count: provisioned.number_of_broker_nodes,
            instance_type: node_group
                .instance_type
                .unwrap_or_else(|| "kafka.m5.large".to_string()),
            authentication,
            publicly_accessible,
            networking: NetworkingState {
                vpc_id: node_group.vpc_id.unwrap_or_default(),
                subnet_ids: node_group.client_subnets,
                security_group_ids: node_group.security_groups,
                availability_zones: node_group.zone_ids,
            },
            bootstrap_brokers,
            topics,
            connectors,
        };
        cluster.validate()?;

        Ok(cluster)
    }

    fn normalize_authentication(dump: ClientAuthenticationDump) -> AuthenticationState {
        let sasl = dump.sasl.unwrap_or_default();
        AuthenticationState {
            sasl_scram: sasl.scram.map(|f| f.enabled).unwrap_or(false),
            sasl_iam: sasl.iam.map(|f| f.enabled).unwrap_or(false),
            mtls: dump.tls.map(|f| f.enabled).unwrap_or(false),
            unauthenticated: dump.unauthenticated.map(|f| f.enabled).unwrap_or(false),
        }
    }

    /// Readiness findings for one cluster: anything that blocks or complicates the
    /// migration path.
    pub fn readiness(&self, cluster: &ClusterState) -> Vec<ReadinessFinding> {
        let mut findings = Vec::new();

        if cluster.preferred_bootstrap().is_none() {
            findings.push(ReadinessFinding {
                severity: FindingSeverity::Blocker,
                message: "No bootstrap broker strings discovered; re-run discovery with GetBootstrapBrokers output".to_string(),
            });
        }

        match convert_kafka_version(&cluster.kafka_version) {
            Err(_) => findings.push(ReadinessFinding {
                severity: FindingSeverity::Blocker,
                message: format!(
                    "Kafka version `{}` could not be mapped to a Confluent-supported version",
                    cluster.kafka_version
                ),
            }),
            Ok(version) => {
                let cluster_link_ready = version
                    .split('.')
                    .next()
                    .and_then(|major| major.parse::<u32>().ok())
                    .map(|major| major >= 3)
                    .unwrap_or(false);
                if !cluster_link_ready {
                    findings.push(ReadinessFinding {
                        severity: FindingSeverity::Warning,
                        message: format!(
                            "Kafka {} predates cluster linking support; plan a jump cluster",
                            version
                        ),
                    });
                }
            }
        }

        if cluster.authentication.unauthenticated {
            findings.push(ReadinessFinding {
                severity: FindingSeverity::Warning,
                message: "Unauthenticated client access is enabled; disable it before linking".to_string(),
            });
        }

        if !cluster.authentication.sasl_scram
            && !cluster.authentication.sasl_iam
            && !cluster.authentication.mtls
        {
            findings.push(ReadinessFinding {
                severity: FindingSeverity::Blocker,
                message: "No supported client authentication mode is enabled".to_string(),
            });
        }

        if cluster.topics.is_empty() {
            findings.push(ReadinessFinding {
                severity: FindingSeverity::Info,
                message: "No topics discovered; topic mirroring assets will be empty".to_string(),
            });
        }

        findings
    }

    pub fn print_scan_table(&self, state: &MigrationState) {
        println!("{}", "MSK cluster scan".bold().blue());
        println!("Region: {}", state.region.yellow());
        println!();

        for cluster in &state.clusters {
            println!("{} {}", "•".blue(), cluster.name.bold());
            println!("    ARN: {}", cluster.arn.cyan());
            println!(
                "    Kafka {} on {} × {}",
                cluster.kafka_version.yellow(),
                cluster.broker_count.to_string().yellow(),
                cluster.instance_type.yellow()
            );
            println!(
                "    Access: {}",
                if cluster.publicly_accessible {
                    "public".green()
                } else {
                    "private".yellow()
                }
            );
            println!(
                "    Topics: {}  Connectors: {}",
                cluster.topics.len().to_string().cyan(),
                cluster.connectors.len().to_string().cyan()
            );

            match MigrationType::recommend(cluster) {
                Ok(migration_type) => println!(
                    "    Recommended path: {}",
                    migration_type.describe().green()
                ),
                Err(err) => println!("    Recommended path: {}", format!("{}", err).red()),
            }

            for finding in self.readiness(cluster) {
                let marker = match finding.severity {
                    FindingSeverity::Info => "i".blue(),
                    FindingSeverity::Warning => "!".yellow(),
                    FindingSeverity::Blocker => "x".red(),
                };
                println!("    {} {}", marker, finding.message);
            }
            println!();
        }
    }
}
