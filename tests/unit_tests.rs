use std::collections::HashMap;

use kcp::assets::{broker_endpoints, AuthMode, LinkStrategy, MigrationType};
use kcp::connectors::infer_plugin_name;
use kcp::convert::convert_kafka_version;
use kcp::state::{
    AuthenticationState, BootstrapBrokers, ClusterState, NetworkingState, TopicState,
};
use kcp::terraform;
use kcp::update::is_newer;

fn test_cluster(public: bool, auth: AuthenticationState) -> ClusterState {
    ClusterState {
        arn: "arn:aws:kafka:us-east-1:111122223333:cluster/orders/abc-123".to_string(),
        name: "orders".to_string(),
        kafka_version: "3.6.0.1".to_string(),
        broker_count: 3,
        instance_type: "kafka.m5.large".to_string(),
        authentication: auth,
        publicly_accessible: public,
        networking: NetworkingState {
            vpc_id: "vpc-1".to_string(),
            subnet_ids: vec!["subnet-1".to_string()],
            security_group_ids: vec!["sg-1".to_string()],
            availability_zones: vec!["use1-az1".to_string()],
        },
        bootstrap_brokers: BootstrapBrokers {
            sasl_scram: Some("b-1.orders.abc.kafka.us-east-1.amazonaws.com:9096".to_string()),
            ..Default::default()
        },
        topics: vec![TopicState {
            name: "orders.created".to_string(),
            partitions: 6,
            replication_factor: 3,
            configs: HashMap::new(),
            internal: false,
        }],
        connectors: Vec::new(),
    }
}

#[test]
fn test_kafka_version_conversion() {
    // MSK build suffix is dropped
    assert_eq!(convert_kafka_version("3.6.0.1").unwrap(), "3.6.0");
    // Non-numeric components become zero
    assert_eq!(convert_kafka_version("4.0.x.kraft").unwrap(), "4.0.0");
    // Short versions are padded
    assert_eq!(convert_kafka_version("2.8").unwrap(), "2.8.0");
    assert_eq!(convert_kafka_version("3").unwrap(), "3.0.0");
    // Already canonical versions pass through
    assert_eq!(convert_kafka_version("3.5.1").unwrap(), "3.5.1");
    // Surrounding whitespace is tolerated
    assert_eq!(convert_kafka_version(" 3.6.0 ").unwrap(), "3.6.0");

    assert!(convert_kafka_version("").is_err());
    assert!(convert_kafka_version("   ").is_err());
    assert!(convert_kafka_version("kraft.3.6").is_err());
}

#[test]
fn test_plugin_name_inference() {
    assert_eq!(
        infer_plugin_name("io.confluent.connect.s3.S3SinkConnector").unwrap(),
        "S3_SINK"
    );
    assert_eq!(
        infer_plugin_name("io.debezium.connector.mysql.MySqlConnector").unwrap(),
        "MySqlCdcSource"
    );
    assert_eq!(
        infer_plugin_name("io.debezium.connector.postgresql.PostgresConnector").unwrap(),
        "PostgresCdcSource"
    );
    assert_eq!(
        infer_plugin_name("com.snowflake.kafka.connector.SnowflakeSinkConnector").unwrap(),
        "SnowflakeSink"
    );

    let err = infer_plugin_name("com.example.HomegrownConnector");
    assert!(err.is_err());
    assert!(err
        .unwrap_err()
        .to_string()
        .contains("com.example.HomegrownConnector"));
}

#[test]
fn test_migration_type_dispatch() {
    let cases = [
        (true, AuthMode::SaslScram, LinkStrategy::ClusterLink, 1),
        (true, AuthMode::SaslIam, LinkStrategy::ClusterLink, 2),
        (false, AuthMode::SaslIam, LinkStrategy::JumpCluster, 3),
        (false, AuthMode::SaslScram, LinkStrategy::JumpCluster, 4),
        (false, AuthMode::Tls, LinkStrategy::JumpCluster, 5),
        (false, AuthMode::Tls, LinkStrategy::PrivateLink, 6),
    ];

    for (public, auth, strategy, number) in cases {
        let migration_type = MigrationType::from_parts(public, auth, strategy).unwrap();
        assert_eq!(migration_type.number(), number);
        assert_eq!(migration_type.is_public(), public);
        assert_eq!(migration_type.auth(), auth);
    }

    // Combinations outside the supported matrix are rejected
    assert!(MigrationType::from_parts(true, AuthMode::Tls, LinkStrategy::ClusterLink).is_err());
    assert!(
        MigrationType::from_parts(false, AuthMode::SaslScram, LinkStrategy::PrivateLink).is_err()
    );
    assert!(
        MigrationType::from_parts(true, AuthMode::SaslScram, LinkStrategy::JumpCluster).is_err()
    );
}

#[test]
fn test_link_strategy_parsing() {
    assert_eq!(
        LinkStrategy::parse("cluster-link").unwrap(),
        LinkStrategy::ClusterLink
    );
    assert_eq!(
        LinkStrategy::parse("jump-cluster").unwrap(),
        LinkStrategy::JumpCluster
    );
    assert_eq!(
        LinkStrategy::parse("private-link").unwrap(),
        LinkStrategy::PrivateLink
    );
    assert!(LinkStrategy::parse("vpn").is_err());
}

#[test]
fn test_migration_type_recommendation() {
    let public_scram = test_cluster(
        true,
        AuthenticationState {
            sasl_scram: true,
            ..Default::default()
        },
    );
    assert_eq!(
        MigrationType::recommend(&public_scram).unwrap(),
        MigrationType::PublicScramDirectLink
    );

    // SCRAM wins over IAM when both are enabled
    let both = test_cluster(
        false,
        AuthenticationState {
            sasl_scram: true,
            sasl_iam: true,
            ..Default::default()
        },
    );
    assert_eq!(
        MigrationType::recommend(&both).unwrap(),
        MigrationType::PrivateScramJumpCluster
    );

    let private_iam = test_cluster(
        false,
        AuthenticationState {
            sasl_iam: true,
            ..Default::default()
        },
    );
    assert_eq!(
        MigrationType::recommend(&private_iam).unwrap(),
        MigrationType::PrivateIamJumpCluster
    );

    // Private mTLS clusters go through PrivateLink rather than a jump cluster
    let private_tls = test_cluster(
        false,
        AuthenticationState {
            mtls: true,
            ..Default::default()
        },
    );
    assert_eq!(
        MigrationType::recommend(&private_tls).unwrap(),
        MigrationType::PrivateTlsPrivateLink
    );

    let no_auth = test_cluster(false, AuthenticationState::default());
    assert!(MigrationType::recommend(&no_auth).is_err());
}

#[test]
fn test_migration_type_description() {
    let t = MigrationType::PrivateScramJumpCluster;
    assert_eq!(
        t.describe(),
        "type 4 (private cluster, SASL/SCRAM, link via jump cluster)"
    );
    assert!(t.uses_jump_cluster());
    assert!(!t.uses_private_link());
}

#[test]
fn test_broker_endpoint_parsing() {
    let endpoints = broker_endpoints(
        "b-1.orders.abc.kafka.us-east-1.amazonaws.com:9096, b-2.orders.abc.kafka.us-east-1.amazonaws.com:9096",
    )
    .unwrap();

    assert_eq!(endpoints.len(), 2);
    assert_eq!(
        endpoints[0].host,
        "b-1.orders.abc.kafka.us-east-1.amazonaws.com"
    );
    assert_eq!(endpoints[0].port, 9096);
    assert_eq!(
        endpoints[1].host,
        "b-2.orders.abc.kafka.us-east-1.amazonaws.com"
    );

    assert!(broker_endpoints("").is_err());
    assert!(broker_endpoints("no-port-here").is_err());
    assert!(broker_endpoints("host:notaport").is_err());
}

#[test]
fn test_resource_name_sanitization() {
    assert_eq!(terraform::sanitize_name("My Cluster"), "my_cluster");
    assert_eq!(
        terraform::sanitize_name("orders.created-v2"),
        "orders_created_v2"
    );
    assert_eq!(terraform::sanitize_name("--weird--"), "weird");
    assert_eq!(terraform::sanitize_name("3scale"), "r_3scale");
    assert_eq!(terraform::sanitize_name("***"), "resource");
}

#[test]
fn test_version_comparison() {
    assert!(is_newer("v0.4.0", "0.3.0"));
    assert!(is_newer("1.0", "0.9.9"));
    assert!(is_newer("0.3.1", "0.3.0"));
    assert!(!is_newer("v0.3.0", "0.3.0"));
    assert!(!is_newer("0.2.9", "0.3.0"));
    // Missing components count as zero
    assert!(!is_newer("0.3", "0.3.0"));
}

#[test]
fn test_hcl_rendering_is_deterministic() {
    let build = || {
        let body = hcl::Body::builder()
            .add_block(terraform::terraform_settings(true, true))
            .add_block(terraform::aws_provider("eu-west-1"))
            .add_block(terraform::cluster_link(&terraform::ClusterLinkSpec {
                resource_name: "msk_source".to_string(),
                link_name: "orders-msk-link".to_string(),
                source_bootstrap: "b-1.orders:9096".to_string(),
                source_security_protocol: "SASL_SSL".to_string(),
                source_sasl_mechanism: Some("SCRAM-SHA-512".to_string()),
                destination_cluster_resource: "destination".to_string(),
                api_key_resource: "link_manager".to_string(),
            }))
            .build();
        terraform::render(&body).unwrap()
    };

    let first = build();
    let second = build();
    assert_eq!(first, second);

    assert!(first.contains("required_providers"));
    assert!(first.contains("hashicorp/aws"));
    assert!(first.contains("confluentinc/confluent"));
    assert!(first.contains("confluent_cluster_link"));
    assert!(first.contains("orders-msk-link"));
    assert!(first.contains("\"bootstrap.servers\""));
    assert!(first.contains("SCRAM-SHA-512"));
}

#[test]
fn test_variable_block_rendering() {
    let body = hcl::Body::builder()
        .add_block(terraform::variable(
            &terraform::VarSpec::string("instance_type", "EC2 instance type")
                .with_default("t3.micro"),
        ))
        .add_block(terraform::variable(&terraform::VarSpec::sensitive_string(
            "kafka_api_secret",
            "Kafka API secret",
        )))
        .build();

    let rendered = terraform::render(&body).unwrap();
    assert!(rendered.contains("variable \"instance_type\""));
    assert!(rendered.contains("default = \"t3.micro\""));
    assert!(rendered.contains("variable \"kafka_api_secret\""));
    assert!(rendered.contains("sensitive = true"));
}
