use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use colored::*;
use handlebars::Handlebars;
use hcl::{Body, Expression};
use regex::Regex;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

use crate::connectors::ConnectorMigrationSummary;
use crate::convert::TargetSpec;
use crate::state::{ClusterState, TerraformState};
use crate::terraform::{
    self, AclSpec, ClusterLinkSpec, IngressRule, InstanceSpec, MirrorTopicSpec, VarSpec, VarType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SaslScram,
    SaslIam,
    Tls,
}

impl AuthMode {
    pub fn security_protocol(&self) -> &'static str {
        match self {
            AuthMode::SaslScram | AuthMode::SaslIam => "SASL_SSL",
            AuthMode::Tls => "SSL",
        }
    }

    pub fn sasl_mechanism(&self) -> Option<&'static str> {
        match self {
            AuthMode::SaslScram => Some("SCRAM-SHA-512"),
            AuthMode::SaslIam => Some("AWS_MSK_IAM"),
            AuthMode::Tls => None,
        }
    }

    pub fn bootstrap<'a>(&self, cluster: &'a ClusterState, public: bool) -> Option<&'a str> {
        let brokers = &cluster.bootstrap_brokers;
        match (self, public) {
            (AuthMode::SaslScram, true) => brokers.public_sasl_scram.as_deref(),
            (AuthMode::SaslScram, false) => brokers.sasl_scram.as_deref(),
            (AuthMode::SaslIam, true) => brokers.public_sasl_iam.as_deref(),
            (AuthMode::SaslIam, false) => brokers.sasl_iam.as_deref(),
            (AuthMode::Tls, true) => brokers.public_tls.as_deref(),
            (AuthMode::Tls, false) => brokers.tls.as_deref(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuthMode::SaslScram => "SASL/SCRAM",
            AuthMode::SaslIam => "SASL/IAM",
            AuthMode::Tls => "mTLS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStrategy {
    ClusterLink,
    JumpCluster,
    PrivateLink,
}

impl LinkStrategy {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "cluster-link" => Ok(LinkStrategy::ClusterLink),
            "jump-cluster" => Ok(LinkStrategy::JumpCluster),
            "private-link" => Ok(LinkStrategy::PrivateLink),
            _ => Err(anyhow::anyhow!(
                "Unknown link strategy `{}` (expected cluster-link, jump-cluster or private-link)",
                value
            )),
        }
    }
}

/// The six supported migration scenarios. Selection is a flat dispatch over the
/// mutually exclusive combination of reachability, source auth, and link strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationType {
    PublicScramDirectLink,
    PublicIamDirectLink,
    PrivateIamJumpCluster,
    PrivateScramJumpCluster,
    PrivateTlsJumpCluster,
    PrivateTlsPrivateLink,
}

impl MigrationType {
    pub fn from_parts(public: bool, auth: AuthMode, strategy: LinkStrategy) -> Result<Self> {
        match (public, auth, strategy) {
            (true, AuthMode::SaslScram, LinkStrategy::ClusterLink) => {
                Ok(MigrationType::PublicScramDirectLink)
            }
            (true, AuthMode::SaslIam, LinkStrategy::ClusterLink) => {
                Ok(MigrationType::PublicIamDirectLink)
            }
            (false, AuthMode::SaslIam, LinkStrategy::JumpCluster) => {
                Ok(MigrationType::PrivateIamJumpCluster)
            }
            (false, AuthMode::SaslScram, LinkStrategy::JumpCluster) => {
                Ok(MigrationType::PrivateScramJumpCluster)
            }
            (false, AuthMode::Tls, LinkStrategy::JumpCluster) => {
                Ok(MigrationType::PrivateTlsJumpCluster)
            }
            (false, AuthMode::Tls, LinkStrategy::PrivateLink) => {
                Ok(MigrationType::PrivateTlsPrivateLink)
            }
            (public, auth, strategy) => Err(anyhow::anyhow!(
                "Unsupported migration combination: {} cluster with {} auth and {:?} linking",
                if public { "public" } else { "private" },
                auth.label(),
                strategy
            )),
        }
    }

    /// Picks the migration type that fits a discovered cluster, preferring SCRAM over
    /// IAM over mTLS and direct links over jump clusters.
    pub fn recommend(cluster: &ClusterState) -> Result<Self> {
        let auth = if cluster.authentication.sasl_scram {
            AuthMode::SaslScram
        } else if cluster.authentication.sasl_iam {
            AuthMode::SaslIam
        } else if cluster.authentication.mtls {
            AuthMode::Tls
        } else {
            return Err(anyhow::anyhow!(
                "Cluster {} has no supported client authentication mode",
                cluster.name
            ));
        };

        let strategy = if cluster.publicly_accessible {
            LinkStrategy::ClusterLink
        } else if auth == AuthMode::Tls {
            LinkStrategy::PrivateLink
        } else {
            LinkStrategy::JumpCluster
        };

        Self::from_parts(cluster.publicly_accessible, auth, strategy)
    }

    pub fn number(&self) -> u8 {
        match self {
            MigrationType::PublicScramDirectLink => 1,
            MigrationType::PublicIamDirectLink => 2,
            MigrationType::PrivateIamJumpCluster => 3,
            MigrationType::PrivateScramJumpCluster => 4,
            MigrationType::PrivateTlsJumpCluster => 5,
            MigrationType::PrivateTlsPrivateLink => 6,
        }
    }

    pub fn auth(&self) -> AuthMode {
        match self {
            MigrationType::PublicScramDirectLink | MigrationType::PrivateScramJumpCluster => {
                AuthMode::SaslScram
            }
            MigrationType::PublicIamDirectLink | MigrationType::PrivateIamJumpCluster => {
                AuthMode::SaslIam
            }
            MigrationType::PrivateTlsJumpCluster | MigrationType::PrivateTlsPrivateLink => {
                AuthMode::Tls
            }
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(
            self,
            MigrationType::PublicScramDirectLink | MigrationType::PublicIamDirectLink
        )
    }

    pub fn uses_jump_cluster(&self) -> bool {
        matches!(
            self,
            MigrationType::PrivateIamJumpCluster
                | MigrationType::PrivateScramJumpCluster
                | MigrationType::PrivateTlsJumpCluster
        )
    }

    pub fn uses_private_link(&self) -> bool {
        matches!(self, MigrationType::PrivateTlsPrivateLink)
    }

    pub fn describe(&self) -> String {
        let detail = match self {
            MigrationType::PublicScramDirectLink => "public cluster, SASL/SCRAM, direct cluster link",
            MigrationType::PublicIamDirectLink => "public cluster, SASL/IAM, direct cluster link",
            MigrationType::PrivateIamJumpCluster => "private cluster, SASL/IAM, link via jump cluster",
            MigrationType::PrivateScramJumpCluster => {
                "private cluster, SASL/SCRAM, link via jump cluster"
            }
            MigrationType::PrivateTlsJumpCluster => "private cluster, mTLS, link via jump cluster",
            MigrationType::PrivateTlsPrivateLink => "private cluster, mTLS, AWS PrivateLink",
        };
        format!("type {} ({})", self.number(), detail)
    }
}

#[derive(Debug, Clone)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
}

/// Splits a bootstrap string (`host:port,host:port,...`) into broker endpoints.
pub fn broker_endpoints(bootstrap: &str) -> Result<Vec<BrokerEndpoint>> {
    let pattern = Regex::new(r"^([A-Za-z0-9.-]+):(\d+)$").unwrap();
    let mut endpoints = Vec::new();

    for entry in bootstrap.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let caps = pattern
            .captures(entry)
            .with_context(|| format!("Invalid broker endpoint `{}`", entry))?;
        endpoints.push(BrokerEndpoint {
            host: caps[1].to_string(),
            port: caps[2].parse().context("Invalid broker port")?,
        });
    }

    if endpoints.is_empty() {
        return Err(anyhow::anyhow!("Bootstrap string contains no endpoints"));
    }

    Ok(endpoints)
}

#[derive(Debug, Clone)]
pub struct AssetFile {
    pub path: String,
    pub content: String,
    pub executable: bool,
}

impl AssetFile {
    fn new(path: &str, content: String) -> Self {
        Self {
            path: path.to_string(),
            content,
            executable: false,
        }
    }

    fn script(path: &str, content: String) -> Self {
        Self {
            path: path.to_string(),
            content,
            executable: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssetPlan {
    pub name: String,
    pub files: Vec<AssetFile>,
}

#[derive(Debug, Clone)]
pub struct BastionRequest {
    pub allowed_cidrs: Vec<String>,
    pub instance_type: String,
}

#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub allowed_cidrs: Vec<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SchemaRequest {
    pub registry_url: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct TargetInfraRequest {
    pub environment_name: String,
    pub cloud: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct ConnectorInfraRequest {
    pub environment_id: String,
    pub cluster_id: String,
}

pub struct AssetGenerator {
    handlebars: Handlebars<'static>,
}

impl Default for AssetGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetGenerator {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars
            .register_template_string("bastion_setup", BASTION_SETUP_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("bastion_readme", BASTION_README_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("proxy_nginx", PROXY_NGINX_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("proxy_setup", PROXY_SETUP_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("proxy_hosts", PROXY_HOSTS_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("proxy_readme", PROXY_README_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("jump_setup", JUMP_SETUP_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("migration_readme", MIGRATION_README_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("mirror_script", MIRROR_SCRIPT_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("topics_readme", TOPICS_README_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("schema_export", SCHEMA_EXPORT_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("schemas_readme", SCHEMAS_README_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("connectors_readme", CONNECTORS_README_TEMPLATE)
            .unwrap();
        handlebars
            .register_template_string("target_readme", TARGET_README_TEMPLATE)
            .unwrap();

        Self { handlebars }
    }

    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String> {
        self.handlebars
            .render(template, data)
            .with_context(|| format!("Failed to render template `{}`", template))
    }

    pub fn generate_bastion_host(
        &self,
        cluster: &ClusterState,
        request: &BastionRequest,
        region: &str,
    ) -> Result<AssetPlan> {
        let bootstrap = cluster
            .preferred_bootstrap()
            .context("Cluster has no bootstrap brokers; cannot configure a bastion")?;
        let subnet = cluster
            .networking
            .subnet_ids
            .first()
            .context("Cluster state has no subnets for the bastion host")?;

        let mut main = Body::builder()
            .add_block(terraform::terraform_settings(true, false))
            .add_block(terraform::aws_provider(region))
            .add_block(terraform::amazon_linux_ami())
            .add_block(terraform::security_group(
                "bastion",
                &format!("{}-bastion", cluster.name),
                &cluster.networking.vpc_id,
                &[IngressRule {
                    description: "SSH access".to_string(),
                    port: 22,
                    protocol: "tcp".to_string(),
                    cidr_blocks: request.allowed_cidrs.clone(),
                }],
            ))
            .add_block(terraform::key_pair(
                "bastion",
                &format!("{}-bastion", cluster.name),
            ));
        main = main.add_block(terraform::ec2_instance(&InstanceSpec {
            resource_name: "bastion".to_string(),
            name_tag: format!("{}-bastion", cluster.name),
            subnet_id: subnet.clone(),
            security_group_resource: "bastion".to_string(),
            key_pair_resource: "bastion".to_string(),
            user_data_file: "bastion_setup.sh".to_string(),
            public_ip: true,
        }));

        let variables = Body::builder()
            .add_block(terraform::variable(&VarSpec::string(
                "ssh_public_key",
                "SSH public key installed on the bastion host",
            )))
            .add_block(terraform::variable(
                &VarSpec::string("instance_type", "Bastion EC2 instance type")
                    .with_default(&request.instance_type),
            ))
            .build();

        let outputs = Body::builder()
            .add_block(terraform::output(
                "bastion_public_ip",
                "aws_instance.bastion.public_ip",
                false,
            ))
            .build();

        let setup = self.render(
            "bastion_setup",
            &json!({
                "cluster_name": cluster.name,
                "bootstrap": bootstrap,
                "security_protocol": "SASL_SSL",
            }),
        )?;
        let readme = self.render(
            "bastion_readme",
            &json!({
                "cluster_name": cluster.name,
                "region": region,
                "bootstrap": bootstrap,
            }),
        )?;

        Ok(AssetPlan {
            name: "bastion-host".to_string(),
            files: vec![
                AssetFile::new("main.tf", terraform::render(&main.build())?),
                AssetFile::new("variables.tf", terraform::render(&variables)?),
                AssetFile::new("outputs.tf", terraform::render(&outputs)?),
                AssetFile::script("bastion_setup.sh", setup),
                AssetFile::new("README.md", readme),
            ],
        })
    }

    pub fn generate_reverse_proxy(
        &self,
        cluster: &ClusterState,
        request: &ProxyRequest,
        region: &str,
    ) -> Result<AssetPlan> {
        let bootstrap = cluster
            .preferred_bootstrap()
            .context("Cluster has no bootstrap brokers; cannot configure a proxy")?;
        let endpoints = broker_endpoints(bootstrap)?;
        let subnet = cluster
            .networking
            .subnet_ids
            .first()
            .context("Cluster state has no subnets for the proxy host")?;

        let broker_data: Vec<serde_json::Value> = endpoints
            .iter()
            .map(|e| json!({ "host": e.host, "port": e.port }))
            .collect();
        let listen_port = endpoints[0].port;

        let ingress: Vec<IngressRule> = endpoints
            .iter()
            .map(|e| IngressRule {
                description: format!("Kafka broker traffic for {}", e.host),
                port: e.port,
                protocol: "tcp".to_string(),
                cidr_blocks: request.allowed_cidrs.clone(),
            })
            .collect();

        let main = Body::builder()
            .add_block(terraform::terraform_settings(true, false))
            .add_block(terraform::aws_provider(region))
            .add_block(terraform::amazon_linux_ami())
            .add_block(terraform::security_group(
                "proxy",
                &format!("{}-proxy", cluster.name),
                &cluster.networking.vpc_id,
                &ingress,
            ))
            .add_block(terraform::key_pair(
                "proxy",
                &format!("{}-proxy", cluster.name),
            ))
            .add_block(terraform::ec2_instance(&InstanceSpec {
                resource_name: "proxy".to_string(),
                name_tag: format!("{}-proxy", cluster.name),
                subnet_id: subnet.clone(),
                security_group_resource: "proxy".to_string(),
                key_pair_resource: "proxy".to_string(),
                user_data_file: "proxy_setup.sh".to_string(),
                public_ip: true,
            }))
            .build();

        let variables = Body::builder()
            .add_block(terraform::variable(&VarSpec::string(
                "ssh_public_key",
                "SSH public key installed on the proxy host",
            )))
            .add_block(terraform::variable(
                &VarSpec::string("instance_type", "Proxy EC2 instance type")
                    .with_default("t3.medium"),
            ))
            .build();

        let outputs = Body::builder()
            .add_block(terraform::output(
                "proxy_public_ip",
                "aws_instance.proxy.public_ip",
                false,
            ))
            .build();

        let data = json!({
            "cluster_name": cluster.name,
            "brokers": broker_data,
            "listen_port": listen_port,
            "domain": request.domain,
        });

        Ok(AssetPlan {
            name: "reverse-proxy".to_string(),
            files: vec![
                AssetFile::new("main.tf", terraform::render(&main)?),
                AssetFile::new("variables.tf", terraform::render(&variables)?),
                AssetFile::new("outputs.tf", terraform::render(&outputs)?),
                AssetFile::new("nginx.conf", self.render("proxy_nginx", &data)?),
                AssetFile::script("proxy_setup.sh", self.render("proxy_setup", &data)?),
                AssetFile::script("hosts_entries.sh", self.render("proxy_hosts", &data)?),
                AssetFile::new("README.md", self.render("proxy_readme", &data)?),
            ],
        })
    }

    pub fn generate_migration_infra(
        &self,
        cluster: &ClusterState,
        target: &TargetSpec,
        migration_type: MigrationType,
        region: &str,
    ) -> Result<AssetPlan> {
        let auth = migration_type.auth();
        let bootstrap = auth
            .bootstrap(cluster, migration_type.is_public())
            .with_context(|| {
                format!(
                    "Cluster {} has no {} bootstrap string for {}",
                    cluster.name,
                    if migration_type.is_public() {
                        "public"
                    } else {
                        "private"
                    },
                    auth.label()
                )
            })?;

        let needs_aws = migration_type.uses_jump_cluster() || migration_type.uses_private_link();

        let mut main = Body::builder()
            .add_block(terraform::terraform_settings(needs_aws, true))
            .add_block(terraform::confluent_provider());
        if needs_aws {
            main = main.add_block(terraform::aws_provider(region));
        }

        main = main
            .add_block(terraform::confluent_environment(
                "migration",
                &format!("{}-migration", cluster.name),
            ))
            .add_block(terraform::confluent_kafka_cluster(
                "destination",
                &cluster.name,
                target.availability.as_terraform(),
                "AWS",
                region,
                &target.cluster_type,
                "migration",
            ))
            .add_block(terraform::confluent_service_account(
                "link_manager",
                &format!("{}-link-manager", cluster.name),
                "Service account that owns the cluster link",
            ))
            .add_block(terraform::confluent_api_key(
                "link_manager",
                &format!("{}-link-manager", cluster.name),
                "link_manager",
                "destination",
                "migration",
            ))
            .add_block(terraform::kafka_acl(&AclSpec {
                resource_name: "link_manager_topics".to_string(),
                principal_resource: "link_manager".to_string(),
                resource_type: "TOPIC".to_string(),
                pattern_name: "*".to_string(),
                pattern_type: "LITERAL".to_string(),
                operation: "ALL".to_string(),
                cluster_resource: "destination".to_string(),
                api_key_resource: "link_manager".to_string(),
            }))
            .add_block(terraform::cluster_link(&ClusterLinkSpec {
                resource_name: "msk_source".to_string(),
                link_name: format!("{}-msk-link", cluster.name),
                source_bootstrap: bootstrap.to_string(),
                source_security_protocol: auth.security_protocol().to_string(),
                source_sasl_mechanism: auth.sasl_mechanism().map(|m| m.to_string()),
                destination_cluster_resource: "destination".to_string(),
                api_key_resource: "link_manager".to_string(),
            }));

        if migration_type.uses_jump_cluster() {
            let subnet = cluster
                .networking
                .subnet_ids
                .first()
                .context("Cluster state has no subnets for the jump cluster host")?;
            main = main
                .add_block(terraform::amazon_linux_ami())
                .add_block(terraform::security_group(
                    "jump",
                    &format!("{}-jump", cluster.name),
                    &cluster.networking.vpc_id,
                    &[IngressRule {
                        description: "SSH access".to_string(),
                        port: 22,
                        protocol: "tcp".to_string(),
                        cidr_blocks: vec!["10.0.0.0/8".to_string()],
                    }],
                ))
                .add_block(terraform::key_pair("jump", &format!("{}-jump", cluster.name)))
                .add_block(terraform::ec2_instance(&InstanceSpec {
                    resource_name: "jump".to_string(),
                    name_tag: format!("{}-jump", cluster.name),
                    subnet_id: subnet.clone(),
                    security_group_resource: "jump".to_string(),
                    key_pair_resource: "jump".to_string(),
                    user_data_file: "jump_setup.sh".to_string(),
                    public_ip: false,
                }));
        }

        if migration_type.uses_private_link() {
            main = main
                .add_block(terraform::security_group(
                    "private_link",
                    &format!("{}-private-link", cluster.name),
                    &cluster.networking.vpc_id,
                    &[IngressRule {
                        description: "HTTPS to Confluent Cloud".to_string(),
                        port: 443,
                        protocol: "tcp".to_string(),
                        cidr_blocks: vec!["10.0.0.0/8".to_string()],
                    }],
                ))
                .add_block(terraform::private_link_attachment(
                    "confluent",
                    &format!("{}-platt", cluster.name),
                    region,
                    "migration",
                ))
                .add_block(terraform::vpc_endpoint(
                    "confluent",
                    "confluent",
                    &cluster.networking.vpc_id,
                    &cluster.networking.subnet_ids,
                    "private_link",
                ))
                .add_block(terraform::private_link_attachment_connection(
                    "confluent",
                    &format!("{}-plattc", cluster.name),
                    "confluent",
                    "confluent",
                    "migration",
                ));
        }

        let mut variables = Body::builder()
            .add_block(terraform::variable(&VarSpec::sensitive_string(
                "confluent_cloud_api_key",
                "Confluent Cloud management API key",
            )))
            .add_block(terraform::variable(&VarSpec::sensitive_string(
                "confluent_cloud_api_secret",
                "Confluent Cloud management API secret",
            )));
        if auth.sasl_mechanism().is_some() {
            variables = variables.add_block(terraform::variable(&VarSpec::sensitive_string(
                "source_sasl_jaas_config",
                "JAAS configuration used by the link to authenticate against MSK",
            )));
        }
        if migration_type.uses_jump_cluster() {
            variables = variables
                .add_block(terraform::variable(&VarSpec::string(
                    "ssh_public_key",
                    "SSH public key installed on the jump cluster host",
                )))
                .add_block(terraform::variable(
                    &VarSpec::string("instance_type", "Jump cluster EC2 instance type")
                        .with_default("m5.xlarge"),
                ));
        }

        let outputs = Body::builder()
            .add_block(terraform::output(
                "kafka_cluster_id",
                "confluent_kafka_cluster.destination.id",
                false,
            ))
            .add_block(terraform::output(
                "kafka_rest_endpoint",
                "confluent_kafka_cluster.destination.rest_endpoint",
                false,
            ))
            .add_block(terraform::output(
                "kafka_bootstrap_endpoint",
                "confluent_kafka_cluster.destination.bootstrap_endpoint",
                false,
            ))
            .add_block(terraform::output(
                "cluster_link_name",
                "confluent_cluster_link.msk_source.link_name",
                false,
            ))
            .add_block(terraform::output(
                "kafka_api_key",
                "confluent_api_key.link_manager.id",
                true,
            ))
            .add_block(terraform::output(
                "kafka_api_secret",
                "confluent_api_key.link_manager.secret",
                true,
            ))
            .build();

        let readme = self.render(
            "migration_readme",
            &json!({
                "cluster_name": cluster.name,
                "migration_type": migration_type.describe(),
                "migration_number": migration_type.number(),
                "auth": auth.label(),
                "bootstrap": bootstrap,
                "jump_cluster": migration_type.uses_jump_cluster(),
                "private_link": migration_type.uses_private_link(),
                "cluster_type": target.cluster_type.label(),
            }),
        )?;

        let mut files = vec![
            AssetFile::new("main.tf", terraform::render(&main.build())?),
            AssetFile::new("variables.tf", terraform::render(&variables.build())?),
            AssetFile::new("outputs.tf", terraform::render(&outputs)?),
            AssetFile::new("README.md", readme),
        ];
        if migration_type.uses_jump_cluster() {
            files.push(AssetFile::script(
                "jump_setup.sh",
                self.render(
                    "jump_setup",
                    &json!({
                        "cluster_name": cluster.name,
                        "bootstrap": bootstrap,
                        "security_protocol": auth.security_protocol(),
                    }),
                )?,
            ));
        }

        Ok(AssetPlan {
            name: "migration-infra".to_string(),
            files,
        })
    }

    pub fn generate_migrate_topics(
        &self,
        cluster: &ClusterState,
        tfstate: &TerraformState,
        include_internal: bool,
    ) -> Result<AssetPlan> {
        let link_name = tfstate.output_str("cluster_link_name")?;
        let cluster_id = tfstate.output_str("kafka_cluster_id")?;
        let rest_endpoint = tfstate.output_str("kafka_rest_endpoint")?;

        let topics = cluster.mirrorable_topics(include_internal);

        let mut body = Body::builder()
            .add_block(terraform::terraform_settings(false, true))
            .add_block(terraform::confluent_provider());
        for topic in &topics {
            body = body.add_block(terraform::mirror_topic(&MirrorTopicSpec {
                resource_name: terraform::sanitize_name(&topic.name),
                topic_name: topic.name.clone(),
                link_name: link_name.clone(),
                cluster_id: cluster_id.clone(),
                rest_endpoint: rest_endpoint.clone(),
            }));
        }

        let variables = Body::builder()
            .add_block(terraform::variable(&VarSpec::sensitive_string(
                "confluent_cloud_api_key",
                "Confluent Cloud management API key",
            )))
            .add_block(terraform::variable(&VarSpec::sensitive_string(
                "confluent_cloud_api_secret",
                "Confluent Cloud management API secret",
            )))
            .add_block(terraform::variable(&VarSpec::sensitive_string(
                "kafka_api_key",
                "Kafka API key for the destination cluster",
            )))
            .add_block(terraform::variable(&VarSpec::sensitive_string(
                "kafka_api_secret",
                "Kafka API secret for the destination cluster",
            )))
            .build();

        let topic_data: Vec<serde_json::Value> = topics
            .iter()
            .map(|t| json!({ "name": t.name, "partitions": t.partitions }))
            .collect();

        let script = self.render(
            "mirror_script",
            &json!({
                "link_name": link_name,
                "cluster_id": cluster_id,
                "topics": topic_data,
                "topic_count": topics.len(),
            }),
        )?;
        let readme = self.render(
            "topics_readme",
            &json!({
                "cluster_name": cluster.name,
                "link_name": link_name,
                "topic_count": topics.len(),
                "include_internal": include_internal,
            }),
        )?;

        Ok(AssetPlan {
            name: "migrate-topics".to_string(),
            files: vec![
                AssetFile::new("mirror_topics.tf", terraform::render(&body.build())?),
                AssetFile::new("variables.tf", terraform::render(&variables)?),
                AssetFile::script("create_mirror_topics.sh", script),
                AssetFile::new("README.md", readme),
            ],
        })
    }

    pub fn generate_migrate_schemas(&self, request: &SchemaRequest) -> Result<AssetPlan> {
        let basic_auth = general_purpose::STANDARD.encode(format!(
            "{}:{}",
            request.api_key, request.api_secret
        ));

        let data = json!({
            "registry_url": request.registry_url.trim_end_matches('/'),
            "basic_auth": basic_auth,
        });

        Ok(AssetPlan {
            name: "migrate-schemas".to_string(),
            files: vec![
                AssetFile::script("export_schemas.sh", self.render("schema_export", &data)?),
                AssetFile::new("README.md", self.render("schemas_readme", &data)?),
            ],
        })
    }

    pub fn generate_migrate_connectors(
        &self,
        summary: &ConnectorMigrationSummary,
        request: &ConnectorInfraRequest,
    ) -> Result<AssetPlan> {
        let mut files = Vec::new();

        let mut body = Body::builder()
            .add_block(terraform::terraform_settings(false, true))
            .add_block(terraform::confluent_provider());

        for migration in &summary.translated {
            let config: BTreeMap<String, String> = migration
                .config
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            body = body.add_block(terraform::confluent_connector(
                &terraform::sanitize_name(&migration.name),
                &migration.plugin_name,
                Expression::from(request.environment_id.clone()),
                Expression::from(request.cluster_id.clone()),
                &config,
            ));

            let payload = json!({
                "name": migration.name,
                "plugin": migration.plugin_name,
                "config": config,
                "warnings": migration.warnings,
            });
            files.push(AssetFile::new(
                &format!("{}.json", terraform::sanitize_name(&migration.name)),
                serde_json::to_string_pretty(&payload)? + "\n",
            ));
        }

        let variables = Body::builder()
            .add_block(terraform::variable(&VarSpec::sensitive_string(
                "confluent_cloud_api_key",
                "Confluent Cloud management API key",
            )))
            .add_block(terraform::variable(&VarSpec::sensitive_string(
                "confluent_cloud_api_secret",
                "Confluent Cloud management API secret",
            )))
            .build();

        let skipped: Vec<serde_json::Value> = summary
            .skipped
            .iter()
            .map(|s| json!({ "name": s.name, "reason": s.reason }))
            .collect();
        let translated: Vec<serde_json::Value> = summary
            .translated
            .iter()
            .map(|m| json!({ "name": m.name, "plugin": m.plugin_name }))
            .collect();

        files.insert(
            0,
            AssetFile::new("connectors.tf", terraform::render(&body.build())?),
        );
        files.push(AssetFile::new(
            "variables.tf",
            terraform::render(&variables)?,
        ));
        files.push(AssetFile::new(
            "README.md",
            self.render(
                "connectors_readme",
                &json!({
                    "environment_id": request.environment_id,
                    "cluster_id": request.cluster_id,
                    "translated": translated,
                    "skipped": skipped,
                }),
            )?,
        ));

        Ok(AssetPlan {
            name: "migrate-connectors".to_string(),
            files,
        })
    }

    pub fn generate_target_infra(
        &self,
        target: &TargetSpec,
        request: &TargetInfraRequest,
    ) -> Result<AssetPlan> {
        let main = Body::builder()
            .add_block(terraform::terraform_settings(false, true))
            .add_block(terraform::confluent_provider())
            .add_block(terraform::confluent_environment(
                "target",
                &request.environment_name,
            ))
            .add_block(terraform::confluent_kafka_cluster(
                "target",
                &target.cluster_name,
                target.availability.as_terraform(),
                &request.cloud,
                &request.region,
                &target.cluster_type,
                "target",
            ))
            .add_block(terraform::confluent_service_account(
                "app_manager",
                &format!("{}-app-manager", target.cluster_name),
                "Service account for application workloads",
            ))
            .add_block(terraform::confluent_api_key(
                "app_manager",
                &format!("{}-app-manager", target.cluster_name),
                "app_manager",
                "target",
                "target",
            ))
            .build();

        let variables = Body::builder()
            .add_block(terraform::variable(&VarSpec::sensitive_string(
                "confluent_cloud_api_key",
                "Confluent Cloud management API key",
            )))
            .add_block(terraform::variable(&VarSpec::sensitive_string(
                "confluent_cloud_api_secret",
                "Confluent Cloud management API secret",
            )))
            .build();

        let outputs = Body::builder()
            .add_block(terraform::output(
                "kafka_cluster_id",
                "confluent_kafka_cluster.target.id",
                false,
            ))
            .add_block(terraform::output(
                "kafka_bootstrap_endpoint",
                "confluent_kafka_cluster.target.bootstrap_endpoint",
                false,
            ))
            .add_block(terraform::output(
                "kafka_api_key",
                "confluent_api_key.app_manager.id",
                true,
            ))
            .add_block(terraform::output(
                "kafka_api_secret",
                "confluent_api_key.app_manager.secret",
                true,
            ))
            .build();

        let readme = self.render(
            "target_readme",
            &json!({
                "cluster_name": target.cluster_name,
                "environment_name": request.environment_name,
                "cloud": request.cloud,
                "region": request.region,
                "cluster_type": target.cluster_type.label(),
                "kafka_version": target.kafka_version,
            }),
        )?;

        Ok(AssetPlan {
            name: "target-infra".to_string(),
            files: vec![
                AssetFile::new("main.tf", terraform::render(&main)?),
                AssetFile::new("variables.tf", terraform::render(&variables)?),
                AssetFile::new("outputs.tf", terraform::render(&outputs)?),
                AssetFile::new("README.md", readme),
            ],
        })
    }
}

/// Writes an asset plan into its output directory, prompting before touching a
/// non-empty directory unless `assume_yes` is set.
pub struct AssetWriter {
    assume_yes: bool,
}

impl AssetWriter {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    pub async fn write(&self, plan: &AssetPlan, output_dir: &Path) -> Result<()> {
        if output_dir.exists() && !self.assume_yes {
            let mut entries = tokio::fs::read_dir(output_dir)
                .await
                .context("Failed to inspect output directory")?;
            if entries.next_entry().await?.is_some() {
                let overwrite = dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "Output directory {} is not empty. Overwrite generated files?",
                        output_dir.display()
                    ))
                    .default(false)
                    .interact()
                    .context("Failed to read confirmation")?;
                if !overwrite {
                    return Err(anyhow::anyhow!("Aborted by user"));
                }
            }
        }

        fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        for file in &plan.files {
            let path = output_dir.join(&file.path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, &file.content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;

            #[cfg(unix)]
            if file.executable {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o755);
                std::fs::set_permissions(&path, perms)
                    .with_context(|| format!("Failed to mark {} executable", path.display()))?;
            }

            log::info!("Wrote {}", path.display());
        }

        println!(
            "{}",
            format!(
                "Generated {} files for {} in {}",
                plan.files.len(),
                plan.name,
                output_dir.display()
            )
            .green()
        );

        Ok(())
    }
}

const BASTION_SETUP_TEMPLATE: &str = r#"#!/bin/bash
set -euo pipefail

# Bastion bootstrap for MSK cluster {{cluster_name}}
dnf install -y java-17-amazon-corretto nmap-ncat

curl -sL https://archive.apache.org/dist/kafka/3.7.0/kafka_2.13-3.7.0.tgz -o /tmp/kafka.tgz
mkdir -p /opt/kafka
tar -xzf /tmp/kafka.tgz --strip-components=1 -C /opt/kafka

cat > /home/ec2-user/client.properties <<'EOF'
bootstrap.servers={{bootstrap}}
security.protocol={{security_protocol}}
EOF
chown ec2-user:ec2-user /home/ec2-user/client.properties

echo "Bastion ready. Kafka CLI lives in /opt/kafka/bin."
"#;

const BASTION_README_TEMPLATE: &str = r#"# Bastion host for {{cluster_name}}

Provisions an EC2 bastion inside the MSK cluster's VPC in {{region}} with the Kafka CLI
preinstalled and a client configuration pointing at:

```
{{bootstrap}}
```

## Usage

1. `terraform init`
2. `terraform apply -var "ssh_public_key=$(cat ~/.ssh/id_ed25519.pub)"`
3. `ssh ec2-user@$(terraform output -raw bastion_public_ip)`
4. `/opt/kafka/bin/kafka-topics.sh --command-config client.properties --bootstrap-server {{bootstrap}} --list`
"#;

const PROXY_NGINX_TEMPLATE: &str = r#"# Reverse proxy for MSK cluster {{cluster_name}}
# TLS SNI routing: clients resolve broker hostnames to the proxy (see
# hosts_entries.sh) and nginx forwards each connection to the broker named in the
# client hello.
stream {
    map $ssl_preread_server_name $broker {
{{#each brokers}}
        {{host}} {{host}}:{{port}};
{{/each}}
    }

    server {
        listen {{listen_port}};
        proxy_pass $broker;
        ssl_preread on;
    }
}
"#;

const PROXY_SETUP_TEMPLATE: &str = r#"#!/bin/bash
set -euo pipefail

dnf install -y nginx nginx-mod-stream

cp ./nginx.conf /etc/nginx/conf.d/kafka-stream.conf
systemctl enable nginx
systemctl restart nginx

echo "Reverse proxy for {{cluster_name}} is up."
"#;

const PROXY_HOSTS_TEMPLATE: &str = r#"#!/bin/bash
# Point broker hostnames at the reverse proxy. Run on each client machine.
set -euo pipefail

PROXY_IP="${1:?usage: hosts_entries.sh <proxy-public-ip>}"

{{#each brokers}}
echo "$PROXY_IP {{host}}" | sudo tee -a /etc/hosts
{{/each}}
"#;

const PROXY_README_TEMPLATE: &str = r#"# Reverse proxy for {{cluster_name}}

Provisions an nginx TCP proxy in front of the MSK brokers so clients outside the VPC
can reach them through a single public IP.

## Usage

1. `terraform init && terraform apply -var "ssh_public_key=$(cat ~/.ssh/id_ed25519.pub)"`
2. Copy `nginx.conf` to the instance if it was customized after apply.
3. On each client, run `./hosts_entries.sh $(terraform output -raw proxy_public_ip)`.

Brokers proxied:
{{#each brokers}}
- {{host}}:{{port}}
{{/each}}
"#;

const JUMP_SETUP_TEMPLATE: &str = r#"#!/bin/bash
set -euo pipefail

# Jump cluster host for migrating {{cluster_name}}. Runs inside the MSK VPC and can
# reach the private brokers at {{bootstrap}}.
dnf install -y java-17-amazon-corretto docker
systemctl enable docker
systemctl start docker

cat > /home/ec2-user/link.properties <<'EOF'
bootstrap.servers={{bootstrap}}
security.protocol={{security_protocol}}
EOF
chown ec2-user:ec2-user /home/ec2-user/link.properties

echo "Jump host ready. Initiate the cluster link from this machine."
"#;

const MIGRATION_README_TEMPLATE: &str = r#"# Migration infrastructure for {{cluster_name}}

Migration path: **{{migration_type}}**

Provisions the Confluent Cloud side of the migration: an environment, a destination
Kafka cluster ({{cluster_type}}), a link-manager service account with its API key, and a
cluster link that mirrors data from the MSK source over {{auth}}.

Source bootstrap servers:

```
{{bootstrap}}
```

{{#if jump_cluster}}
This path also provisions a jump host inside the MSK VPC. Apply from a machine that can
reach the VPC, then initiate the link from the jump host using `link.properties`.
{{/if}}
{{#if private_link}}
This path provisions an AWS PrivateLink attachment and VPC endpoint so link traffic
never crosses the public internet. DNS propagation for the endpoint can take a few
minutes after apply.
{{/if}}

## Usage

1. `terraform init`
2. `terraform apply`
3. Continue with `kcp create-asset migrate-topics --tfstate terraform.tfstate`
"#;

const MIRROR_SCRIPT_TEMPLATE: &str = r#"#!/bin/bash
# Creates mirror topics over the {{link_name}} cluster link using the confluent CLI.
set -euo pipefail

{{#each topics}}
confluent kafka mirror create "{{name}}" \
  --link "{{../link_name}}" \
  --cluster "{{../cluster_id}}"
{{/each}}

echo "Requested {{topic_count}} mirror topics over link {{link_name}}."
"#;

const TOPICS_README_TEMPLATE: &str = r#"# Topic mirroring for {{cluster_name}}

Creates {{topic_count}} mirror topics over the `{{link_name}}` cluster link.
{{#unless include_internal}}
Internal topics (names starting with `__`) are excluded.
{{/unless}}

Apply either the Terraform resources (`mirror_topics.tf`) or the CLI script
(`create_mirror_topics.sh`); they are equivalent.
"#;

const SCHEMA_EXPORT_TEMPLATE: &str = r#"#!/bin/bash
# Exports every subject from the source schema registry into ./schemas/.
set -euo pipefail

REGISTRY_URL="{{registry_url}}"
AUTH_HEADER="Authorization: Basic {{basic_auth}}"

mkdir -p schemas

subjects=$(curl -sf -H "$AUTH_HEADER" "$REGISTRY_URL/subjects" | tr -d '[]"' | tr ',' ' ')

for subject in $subjects; do
  echo "Exporting $subject"
  curl -sf -H "$AUTH_HEADER" \
    "$REGISTRY_URL/subjects/$subject/versions/latest" \
    -o "schemas/$subject.json"
done

echo "Exported $(ls schemas | wc -l) subjects."
"#;

const SCHEMAS_README_TEMPLATE: &str = r#"# Schema migration

`export_schemas.sh` downloads the latest version of every subject from the source
schema registry at `{{registry_url}}` into `./schemas/`.

Import them into Confluent Cloud Schema Registry with:

```
for f in schemas/*.json; do
  subject=$(basename "$f" .json)
  jq -r '.schema' "$f" | confluent schema-registry schema create --subject "$subject" --schema /dev/stdin
done
```
"#;

const CONNECTORS_README_TEMPLATE: &str = r#"# Connector migration

Translated connector configurations for Confluent Cloud environment
`{{environment_id}}`, cluster `{{cluster_id}}`.

## Translated
{{#each translated}}
- `{{name}}` → {{plugin}}
{{/each}}

## Skipped
{{#each skipped}}
- `{{name}}`: {{reason}}
{{/each}}

Apply `connectors.tf` to create the translated connectors, or submit the individual
JSON files through the Confluent Cloud API.
"#;

const TARGET_README_TEMPLATE: &str = r#"# Target infrastructure: {{cluster_name}}

Provisions a standalone Confluent Cloud environment `{{environment_name}}` with a
{{cluster_type}} cluster in {{cloud}}/{{region}} (Kafka {{kafka_version}} equivalent),
an application service account, and its API key.

## Usage

1. `terraform init`
2. `terraform apply`
3. Read connection details from `terraform output`.
"#;
