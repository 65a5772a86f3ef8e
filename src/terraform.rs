use anyhow::{Context, Result};
use hcl::expr::{FuncCall, Object, ObjectKey, Traversal, TraversalOperator, Variable};
use hcl::{Block, Body, Expression, Identifier, Number};
use std::collections::BTreeMap;

use crate::convert::ConfluentClusterType;

/// Renders a Terraform body to HCL text. Rendering is deterministic: block and
/// attribute order follows insertion order, so identical inputs produce identical
/// output.
pub fn render(body: &Body) -> Result<String> {
    hcl::to_string(body).context("Failed to render HCL")
}

/// Builds an unquoted reference expression from a dot-separated path, e.g.
/// `aws_security_group.bastion.id`. Numeric segments become index operators.
pub fn tf_ref(path: &str) -> Expression {
    let mut parts = path.split('.');
    let root = Variable::unchecked(parts.next().unwrap_or_default());

    let operators: Vec<TraversalOperator> = parts
        .map(|part| match part.parse::<u64>() {
            Ok(index) => TraversalOperator::LegacyIndex(index),
            Err(_) => TraversalOperator::GetAttr(Identifier::unchecked(part)),
        })
        .collect();

    Expression::from(Traversal::new(root, operators))
}

fn num(value: u64) -> Expression {
    Expression::Number(Number::from(value))
}

fn string_list(values: &[String]) -> Expression {
    Expression::Array(values.iter().map(|v| Expression::from(v.clone())).collect())
}

/// Object expression with quoted keys, for Kafka-style property maps whose keys
/// contain dots.
fn quoted_object(map: &BTreeMap<String, String>) -> Expression {
    let object: Object<ObjectKey, Expression> = map
        .iter()
        .map(|(k, v)| {
            (
                ObjectKey::Expression(Expression::from(k.clone())),
                Expression::from(v.clone()),
            )
        })
        .collect();
    Expression::Object(object)
}

/// Object expression with bare identifier keys, for provider maps and tags.
fn ident_object(pairs: &[(&str, &str)]) -> Expression {
    let object: Object<ObjectKey, Expression> = pairs
        .iter()
        .map(|(k, v)| {
            (
                ObjectKey::Identifier(Identifier::unchecked(*k)),
                Expression::from(*v),
            )
        })
        .collect();
    Expression::Object(object)
}

/// Lowercases a display name into a valid Terraform resource identifier.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_underscore = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore && !out.is_empty() {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("resource");
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "r_");
    }

    out
}

#[derive(Debug, Clone)]
pub struct IngressRule {
    pub description: String,
    pub port: u16,
    pub protocol: String,
    pub cidr_blocks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    String,
    Number,
    Bool,
    ListString,
}

impl VarType {
    fn as_expression(&self) -> Expression {
        match self {
            VarType::String => Expression::from(Variable::unchecked("string")),
            VarType::Number => Expression::from(Variable::unchecked("number")),
            VarType::Bool => Expression::from(Variable::unchecked("bool")),
            VarType::ListString => Expression::from(
                FuncCall::builder("list")
                    .arg(Expression::from(Variable::unchecked("string")))
                    .build(),
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VarSpec {
    pub name: String,
    pub description: String,
    pub var_type: VarType,
    pub sensitive: bool,
    pub default: Option<String>,
}

impl VarSpec {
    pub fn string(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            var_type: VarType::String,
            sensitive: false,
            default: None,
        }
    }

    pub fn sensitive_string(name: &str, description: &str) -> Self {
        Self {
            sensitive: true,
            ..Self::string(name, description)
        }
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }
}

pub fn variable(spec: &VarSpec) -> Block {
    let mut builder = Block::builder("variable")
        .add_label(spec.name.as_str())
        .add_attribute(("description", spec.description.as_str()))
        .add_attribute(("type", spec.var_type.as_expression()));

    if let Some(default) = &spec.default {
        builder = builder.add_attribute(("default", default.as_str()));
    }
    if spec.sensitive {
        builder = builder.add_attribute(("sensitive", true));
    }

    builder.build()
}

pub fn output(name: &str, value_ref: &str, sensitive: bool) -> Block {
    let mut builder = Block::builder("output")
        .add_label(name)
        .add_attribute(("value", tf_ref(value_ref)));

    if sensitive {
        builder = builder.add_attribute(("sensitive", true));
    }

    builder.build()
}

pub fn terraform_settings(aws: bool, confluent: bool) -> Block {
    let mut providers = Block::builder("required_providers");

    if aws {
        providers = providers.add_attribute((
            "aws",
            ident_object(&[("source", "hashicorp/aws"), ("version", "~> 5.0")]),
        ));
    }
    if confluent {
        providers = providers.add_attribute((
            "confluent",
            ident_object(&[("source", "confluentinc/confluent"), ("version", "~> 2.0")]),
        ));
    }

    Block::builder("terraform")
        .add_attribute(("required_version", ">= 1.5"))
        .add_block(providers.build())
        .build()
}

pub fn aws_provider(region: &str) -> Block {
    Block::builder("provider")
        .add_label("aws")
        .add_attribute(("region", region))
        .build()
}

pub fn confluent_provider() -> Block {
    Block::builder("provider")
        .add_label("confluent")
        .add_attribute(("cloud_api_key", tf_ref("var.confluent_cloud_api_key")))
        .add_attribute(("cloud_api_secret", tf_ref("var.confluent_cloud_api_secret")))
        .build()
}

pub fn amazon_linux_ami() -> Block {
    Block::builder("data")
        .add_label("aws_ami")
        .add_label("amazon_linux")
        .add_attribute(("most_recent", true))
        .add_attribute(("owners", string_list(&["amazon".to_string()])))
        .add_block(
            Block::builder("filter")
                .add_attribute(("name", "name"))
                .add_attribute(("values", string_list(&["al2023-ami-*-x86_64".to_string()])))
                .build(),
        )
        .build()
}

pub fn security_group(
    resource_name: &str,
    group_name: &str,
    vpc_id: &str,
    rules: &[IngressRule],
) -> Block {
    let mut builder = Block::builder("resource")
        .add_label("aws_security_group")
        .add_label(resource_name)
        .add_attribute(("name", group_name))
        .add_attribute(("description", format!("Managed by kcp for {}", group_name)))
        .add_attribute(("vpc_id", vpc_id));

    for rule in rules {
        builder = builder.add_block(
            Block::builder("ingress")
                .add_attribute(("description", rule.description.as_str()))
                .add_attribute(("from_port", num(rule.port as u64)))
                .add_attribute(("to_port", num(rule.port as u64)))
                .add_attribute(("protocol", rule.protocol.as_str()))
                .add_attribute(("cidr_blocks", string_list(&rule.cidr_blocks)))
                .build(),
        );
    }

    builder
        .add_block(
            Block::builder("egress")
                .add_attribute(("description", "Allow all outbound traffic"))
                .add_attribute(("from_port", num(0)))
                .add_attribute(("to_port", num(0)))
                .add_attribute(("protocol", "-1"))
                .add_attribute(("cidr_blocks", string_list(&["0.0.0.0/0".to_string()])))
                .build(),
        )
        .build()
}

pub fn key_pair(resource_name: &str, key_name: &str) -> Block {
    Block::builder("resource")
        .add_label("aws_key_pair")
        .add_label(resource_name)
        .add_attribute(("key_name", key_name))
        .add_attribute(("public_key", tf_ref("var.ssh_public_key")))
        .build()
}

#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub resource_name: String,
    pub name_tag: String,
    pub subnet_id: String,
    pub security_group_resource: String,
    pub key_pair_resource: String,
    pub user_data_file: String,
    pub public_ip: bool,
}

pub fn ec2_instance(spec: &InstanceSpec) -> Block {
    Block::builder("resource")
        .add_label("aws_instance")
        .add_label(spec.resource_name.as_str())
        .add_attribute(("ami", tf_ref("data.aws_ami.amazon_linux.id")))
        .add_attribute(("instance_type", tf_ref("var.instance_type")))
        .add_attribute(("subnet_id", spec.subnet_id.as_str()))
        .add_attribute((
            "vpc_security_group_ids",
            Expression::Array(vec![tf_ref(&format!(
                "aws_security_group.{}.id",
                spec.security_group_resource
            ))]),
        ))
        .add_attribute((
            "key_name",
            tf_ref(&format!(
                "aws_key_pair.{}.key_name",
                spec.key_pair_resource
            )),
        ))
        .add_attribute(("associate_public_ip_address", spec.public_ip))
        .add_attribute((
            "user_data",
            Expression::from(
                FuncCall::builder("file")
                    .arg(format!("./{}", spec.user_data_file))
                    .build(),
            ),
        ))
        .add_attribute(("tags", ident_object(&[("Name", spec.name_tag.as_str())])))
        .build()
}

pub fn confluent_environment(resource_name: &str, display_name: &str) -> Block {
    Block::builder("resource")
        .add_label("confluent_environment")
        .add_label(resource_name)
        .add_attribute(("display_name", display_name))
        .build()
}

pub fn confluent_kafka_cluster(
    resource_name: &str,
    display_name: &str,
    availability: &str,
    cloud: &str,
    region: &str,
    cluster_type: &ConfluentClusterType,
    environment_resource: &str,
) -> Block {
    let mut builder = Block::builder("resource")
        .add_label("confluent_kafka_cluster")
        .add_label(resource_name)
        .add_attribute(("display_name", display_name))
        .add_attribute(("availability", availability))
        .add_attribute(("cloud", cloud))
        .add_attribute(("region", region));

    builder = match cluster_type {
        ConfluentClusterType::Basic => builder.add_block(Block::builder("basic").build()),
        ConfluentClusterType::Standard => builder.add_block(Block::builder("standard").build()),
        ConfluentClusterType::Dedicated { cku } => builder.add_block(
            Block::builder("dedicated")
                .add_attribute(("cku", num(*cku as u64)))
                .build(),
        ),
    };

    builder
        .add_block(
            Block::builder("environment")
                .add_attribute((
                    "id",
                    tf_ref(&format!("confluent_environment.{}.id", environment_resource)),
                ))
                .build(),
        )
        .build()
}

pub fn confluent_service_account(
    resource_name: &str,
    display_name: &str,
    description: &str,
) -> Block {
    Block::builder("resource")
        .add_label("confluent_service_account")
        .add_label(resource_name)
        .add_attribute(("display_name", display_name))
        .add_attribute(("description", description))
        .build()
}

pub fn confluent_api_key(
    resource_name: &str,
    display_name: &str,
    owner_resource: &str,
    cluster_resource: &str,
    environment_resource: &str,
) -> Block {
    Block::builder("resource")
        .add_label("confluent_api_key")
        .add_label(resource_name)
        .add_attribute(("display_name", display_name))
        .add_attribute(("description", "Cluster API key managed by kcp"))
        .add_block(
            Block::builder("owner")
                .add_attribute((
                    "id",
                    tf_ref(&format!("confluent_service_account.{}.id", owner_resource)),
                ))
                .add_attribute((
                    "api_version",
                    tf_ref(&format!(
                        "confluent_service_account.{}.api_version",
                        owner_resource
                    )),
                ))
                .add_attribute((
                    "kind",
                    tf_ref(&format!(
                        "confluent_service_account.{}.kind",
                        owner_resource
                    )),
                ))
                .build(),
        )
        .add_block(
            Block::builder("managed_resource")
                .add_attribute((
                    "id",
                    tf_ref(&format!("confluent_kafka_cluster.{}.id", cluster_resource)),
                ))
                .add_attribute((
                    "api_version",
                    tf_ref(&format!(
                        "confluent_kafka_cluster.{}.api_version",
                        cluster_resource
                    )),
                ))
                .add_attribute((
                    "kind",
                    tf_ref(&format!(
                        "confluent_kafka_cluster.{}.kind",
                        cluster_resource
                    )),
                ))
                .add_block(
                    Block::builder("environment")
                        .add_attribute((
                            "id",
                            tf_ref(&format!(
                                "confluent_environment.{}.id",
                                environment_resource
                            )),
                        ))
                        .build(),
                )
                .build(),
        )
        .build()
}

#[derive(Debug, Clone)]
pub struct ClusterLinkSpec {
    pub resource_name: String,
    pub link_name: String,
    pub source_bootstrap: String,
    pub source_security_protocol: String,
    pub source_sasl_mechanism: Option<String>,
    pub destination_cluster_resource: String,
    pub api_key_resource: String,
}

pub fn cluster_link(spec: &ClusterLinkSpec) -> Block {
    let mut entries: Vec<(ObjectKey, Expression)> = vec![
        (
            ObjectKey::Expression(Expression::from("bootstrap.servers")),
            Expression::from(spec.source_bootstrap.clone()),
        ),
        (
            ObjectKey::Expression(Expression::from("security.protocol")),
            Expression::from(spec.source_security_protocol.clone()),
        ),
    ];
    if let Some(mechanism) = &spec.source_sasl_mechanism {
        entries.push((
            ObjectKey::Expression(Expression::from("sasl.mechanism")),
            Expression::from(mechanism.clone()),
        ));
        entries.push((
            ObjectKey::Expression(Expression::from("sasl.jaas.config")),
            tf_ref("var.source_sasl_jaas_config"),
        ));
    }
    let config: Object<ObjectKey, Expression> = entries.into_iter().collect();

    Block::builder("resource")
        .add_label("confluent_cluster_link")
        .add_label(spec.resource_name.as_str())
        .add_attribute(("link_name", spec.link_name.as_str()))
        .add_attribute(("link_mode", "DESTINATION"))
        .add_attribute(("connection_mode", "OUTBOUND"))
        .add_block(
            Block::builder("destination_kafka_cluster")
                .add_attribute((
                    "id",
                    tf_ref(&format!(
                        "confluent_kafka_cluster.{}.id",
                        spec.destination_cluster_resource
                    )),
                ))
                .add_attribute((
                    "rest_endpoint",
                    tf_ref(&format!(
                        "confluent_kafka_cluster.{}.rest_endpoint",
                        spec.destination_cluster_resource
                    )),
                ))
                .add_block(
                    Block::builder("credentials")
                        .add_attribute((
                            "key",
                            tf_ref(&format!(
                                "confluent_api_key.{}.id",
                                spec.api_key_resource
                            )),
                        ))
                        .add_attribute((
                            "secret",
                            tf_ref(&format!(
                                "confluent_api_key.{}.secret",
                                spec.api_key_resource
                            )),
                        ))
                        .build(),
                )
                .build(),
        )
        .add_attribute(("config", Expression::Object(config)))
        .build()
}

#[derive(Debug, Clone)]
pub struct MirrorTopicSpec {
    pub resource_name: String,
    pub topic_name: String,
    pub link_name: String,
    pub cluster_id: String,
    pub rest_endpoint: String,
}

/// Mirror topic resource wired to literal values pulled from a prior apply's
/// Terraform state rather than in-config references.
pub fn mirror_topic(spec: &MirrorTopicSpec) -> Block {
    Block::builder("resource")
        .add_label("confluent_kafka_mirror_topic")
        .add_label(spec.resource_name.as_str())
        .add_block(
            Block::builder("source_kafka_topic")
                .add_attribute(("topic_name", spec.topic_name.as_str()))
                .build(),
        )
        .add_block(
            Block::builder("cluster_link")
                .add_attribute(("link_name", spec.link_name.as_str()))
                .build(),
        )
        .add_block(
            Block::builder("kafka_cluster")
                .add_attribute(("id", spec.cluster_id.as_str()))
                .add_attribute(("rest_endpoint", spec.rest_endpoint.as_str()))
                .add_block(
                    Block::builder("credentials")
                        .add_attribute(("key", tf_ref("var.kafka_api_key")))
                        .add_attribute(("secret", tf_ref("var.kafka_api_secret")))
                        .build(),
                )
                .build(),
        )
        .build()
}

#[derive(Debug, Clone)]
pub struct AclSpec {
    pub resource_name: String,
    pub principal_resource: String,
    pub resource_type: String,
    pub pattern_name: String,
    pub pattern_type: String,
    pub operation: String,
    pub cluster_resource: String,
    pub api_key_resource: String,
}

pub fn kafka_acl(spec: &AclSpec) -> Block {
    Block::builder("resource")
        .add_label("confluent_kafka_acl")
        .add_label(spec.resource_name.as_str())
        .add_block(
            Block::builder("kafka_cluster")
                .add_attribute((
                    "id",
                    tf_ref(&format!(
                        "confluent_kafka_cluster.{}.id",
                        spec.cluster_resource
                    )),
                ))
                .build(),
        )
        .add_attribute(("resource_type", spec.resource_type.as_str()))
        .add_attribute(("resource_name", spec.pattern_name.as_str()))
        .add_attribute(("pattern_type", spec.pattern_type.as_str()))
        .add_attribute((
            "principal",
            Expression::from(format!(
                "User:${{confluent_service_account.{}.id}}",
                spec.principal_resource
            )),
        ))
        .add_attribute(("host", "*"))
        .add_attribute(("operation", spec.operation.as_str()))
        .add_attribute(("permission", "ALLOW"))
        .add_attribute((
            "rest_endpoint",
            tf_ref(&format!(
                "confluent_kafka_cluster.{}.rest_endpoint",
                spec.cluster_resource
            )),
        ))
        .add_block(
            Block::builder("credentials")
                .add_attribute((
                    "key",
                    tf_ref(&format!("confluent_api_key.{}.id", spec.api_key_resource)),
                ))
                .add_attribute((
                    "secret",
                    tf_ref(&format!(
                        "confluent_api_key.{}.secret",
                        spec.api_key_resource
                    )),
                ))
                .build(),
        )
        .build()
}

pub fn private_link_attachment(
    resource_name: &str,
    display_name: &str,
    region: &str,
    environment_resource: &str,
) -> Block {
    Block::builder("resource")
        .add_label("confluent_private_link_attachment")
        .add_label(resource_name)
        .add_attribute(("display_name", display_name))
        .add_attribute(("cloud", "AWS"))
        .add_attribute(("region", region))
        .add_block(
            Block::builder("environment")
                .add_attribute((
                    "id",
                    tf_ref(&format!(
                        "confluent_environment.{}.id",
                        environment_resource
                    )),
                ))
                .build(),
        )
        .build()
}

pub fn private_link_attachment_connection(
    resource_name: &str,
    display_name: &str,
    attachment_resource: &str,
    vpc_endpoint_resource: &str,
    environment_resource: &str,
) -> Block {
    Block::builder("resource")
        .add_label("confluent_private_link_attachment_connection")
        .add_label(resource_name)
        .add_attribute(("display_name", display_name))
        .add_block(
            Block::builder("environment")
                .add_attribute((
                    "id",
                    tf_ref(&format!(
                        "confluent_environment.{}.id",
                        environment_resource
                    )),
                ))
                .build(),
        )
        .add_block(
            Block::builder("aws")
                .add_attribute((
                    "vpc_endpoint_id",
                    tf_ref(&format!("aws_vpc_endpoint.{}.id", vpc_endpoint_resource)),
                ))
                .build(),
        )
        .add_block(
            Block::builder("private_link_attachment")
                .add_attribute((
                    "id",
                    tf_ref(&format!(
                        "confluent_private_link_attachment.{}.id",
                        attachment_resource
                    )),
                ))
                .build(),
        )
        .build()
}

pub fn vpc_endpoint(
    resource_name: &str,
    attachment_resource: &str,
    vpc_id: &str,
    subnet_ids: &[String],
    security_group_resource: &str,
) -> Block {
    Block::builder("resource")
        .add_label("aws_vpc_endpoint")
        .add_label(resource_name)
        .add_attribute(("vpc_id", vpc_id))
        .add_attribute((
            "service_name",
            tf_ref(&format!(
                "confluent_private_link_attachment.{}.aws.0.vpc_endpoint_service_name",
                attachment_resource
            )),
        ))
        .add_attribute(("vpc_endpoint_type", "Interface"))
        .add_attribute(("subnet_ids", string_list(subnet_ids)))
        .add_attribute((
            "security_group_ids",
            Expression::Array(vec![tf_ref(&format!(
                "aws_security_group.{}.id",
                security_group_resource
            ))]),
        ))
        .add_attribute(("private_dns_enabled", true))
        .build()
}

pub fn confluent_connector(
    resource_name: &str,
    plugin_name: &str,
    environment_id: Expression,
    cluster_id: Expression,
    config: &BTreeMap<String, String>,
) -> Block {
    let mut full_config = config.clone();
    full_config.insert("connector.class".to_string(), plugin_name.to_string());

    Block::builder("resource")
        .add_label("confluent_connector")
        .add_label(resource_name)
        .add_block(
            Block::builder("environment")
                .add_attribute(("id", environment_id))
                .build(),
        )
        .add_block(
            Block::builder("kafka_cluster")
                .add_attribute(("id", cluster_id))
                .build(),
        )
        .add_attribute(("config_sensitive", quoted_object(&BTreeMap::new())))
        .add_attribute(("config_nonsensitive", quoted_object(&full_config)))
        .build()
}
