use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::collections::HashMap;
use tempfile::TempDir;
use tokio::fs;

use kcp::assets::{
    AssetGenerator, AssetWriter, BastionRequest, ConnectorInfraRequest, MigrationType,
    ProxyRequest,
};
use kcp::connectors::{ConnectorMigrator, TranslateClient};
use kcp::convert::TargetPlanner;
use kcp::scan::ClusterScanner;
use kcp::state::{
    AuthenticationState, BootstrapBrokers, ClusterState, ConnectorState, MigrationState,
    NetworkingState, TerraformState, TopicState,
};

const SAMPLE_DUMP: &str = r#"{
    "Region": "eu-west-1",
    "Clusters": [{
        "ClusterArn": "arn:aws:kafka:eu-west-1:111122223333:cluster/payments/uuid-1",
        "ClusterName": "payments",
        "Provisioned": {
            "CurrentBrokerSoftwareInfo": { "KafkaVersion": "3.6.0.1" },
            "NumberOfBrokerNodes": 3,
            "BrokerNodeGroupInfo": {
                "InstanceType": "kafka.m5.large",
                "ClientSubnets": ["subnet-1", "subnet-2"],
                "SecurityGroups": ["sg-1"],
                "ZoneIds": ["euw1-az1", "euw1-az2"],
                "VpcId": "vpc-1"
            },
            "ClientAuthentication": { "Sasl": { "Scram": { "Enabled": true } } },
            "ConnectivityInfo": { "PublicAccess": { "Type": "DISABLED" } }
        },
        "BootstrapBrokers": {
            "BootstrapBrokerStringSaslScram": "b-1.payments.abc.kafka.eu-west-1.amazonaws.com:9096,b-2.payments.abc.kafka.eu-west-1.amazonaws.com:9096"
        },
        "Topics": [
            { "Name": "payments.events", "Partitions": 12, "ReplicationFactor": 3 },
            { "Name": "__consumer_offsets", "Internal": true }
        ],
        "Connectors": [{
            "ConnectorName": "s3-archive",
            "ConnectorConfiguration": {
                "connector.class": "io.confluent.connect.s3.S3SinkConnector",
                "tasks.max": "2",
                "s3.bucket.name": "payments-archive"
            }
        }]
    }]
}"#;

fn sample_cluster() -> ClusterState {
    ClusterState {
        arn: "arn:aws:kafka:eu-west-1:111122223333:cluster/payments/uuid-1".to_string(),
        name: "payments".to_string(),
        kafka_version: "3.6.0.1".to_string(),
        broker_count: 3,
        instance_type: "kafka.m5.large".to_string(),
        authentication: AuthenticationState {
            sasl_scram: true,
            ..Default::default()
        },
        publicly_accessible: false,
        networking: NetworkingState {
            vpc_id: "vpc-1".to_string(),
            subnet_ids: vec!["subnet-1".to_string(), "subnet-2".to_string()],
            security_group_ids: vec!["sg-1".to_string()],
            availability_zones: vec!["euw1-az1".to_string(), "euw1-az2".to_string()],
        },
        bootstrap_brokers: BootstrapBrokers {
            sasl_scram: Some(
                "b-1.payments.abc.kafka.eu-west-1.amazonaws.com:9096,b-2.payments.abc.kafka.eu-west-1.amazonaws.com:9096"
                    .to_string(),
            ),
            ..Default::default()
        },
        topics: vec![
            TopicState {
                name: "payments.events".to_string(),
                partitions: 12,
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

#[tokio::test]
async fn test_scan_single_dump_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let dump_file = temp_dir.path().join("discovery.json");
    fs::write(&dump_file, SAMPLE_DUMP).await?;

    let scanner = ClusterScanner::new();
    let state = scanner.scan(&dump_file).await?;

    assert_eq!(state.region, "eu-west-1");
    assert_eq!(state.clusters.len(), 1);

    let cluster = &state.clusters[0];
    assert_eq!(cluster.name, "payments");
    // Raw MSK version is preserved in the state; normalization happens at planning
    assert_eq!(cluster.kafka_version, "3.6.0.1");
    assert_eq!(cluster.broker_count, 3);
    assert!(cluster.authentication.sasl_scram);
    assert!(!cluster.authentication.sasl_iam);
    assert!(!cluster.publicly_accessible);
    assert_eq!(cluster.networking.subnet_ids.len(), 2);
    assert_eq!(cluster.topics.len(), 2);

    assert_eq!(cluster.connectors.len(), 1);
    let connector = &cluster.connectors[0];
    assert_eq!(connector.name, "s3-archive");
    assert_eq!(
        connector.connector_class,
        "io.confluent.connect.s3.S3SinkConnector"
    );
    assert_eq!(connector.tasks_max, 2);

    // State file round trip
    let state_file = temp_dir.path().join("kcp-state.json");
    state.save(&state_file).await?;
    let reloaded = MigrationState::load(&state_file).await?;
    assert_eq!(reloaded.clusters[0].name, "payments");
    assert_eq!(reloaded.region, "eu-west-1");

    Ok(())
}

#[tokio::test]
async fn test_scan_directory_collects_all_dumps() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("a.json"), SAMPLE_DUMP).await?;

    // Second dump without a Region field; the region comes from the cluster ARN
    let second = SAMPLE_DUMP
        .replace("\"Region\": \"eu-west-1\",", "")
        .replace("payments", "billing");
    fs::write(temp_dir.path().join("b.json"), second).await?;
    fs::write(temp_dir.path().join("notes.txt"), "ignored").await?;

    let state = ClusterScanner::new().scan(temp_dir.path()).await?;
    assert_eq!(state.clusters.len(), 2);
    assert_eq!(state.region, "eu-west-1");

    let names: Vec<&str> = state.clusters.iter().map(|c| c.name.as_str()).collect();
    assert!(names.contains(&"payments"));
    assert!(names.contains(&"billing"));

    Ok(())
}

#[tokio::test]
async fn test_scan_rejects_serverless_clusters() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let dump_file = temp_dir.path().join("discovery.json");
    fs::write(
        &dump_file,
        r#"{
            "Region": "eu-west-1",
            "Clusters": [{
                "ClusterArn": "arn:aws:kafka:eu-west-1:111122223333:cluster/sls/uuid-2",
                "ClusterName": "sls"
            }]
        }"#,
    )
    .await?;

    let result = ClusterScanner::new().scan(&dump_file).await;
    assert!(result.is_err());
    assert!(format!("{:#}", result.unwrap_err()).contains("serverless"));

    Ok(())
}

#[tokio::test]
async fn test_target_planning_from_scan() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let dump_file = temp_dir.path().join("discovery.json");
    fs::write(&dump_file, SAMPLE_DUMP).await?;

    let state = ClusterScanner::new().scan(&dump_file).await?;
    let planner = TargetPlanner::new(state.region.clone());
    let specs = planner.plan_all(&state)?;

    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].kafka_version, "3.6.0");
    assert_eq!(specs[0].source_kafka_version, "3.6.0.1");

    Ok(())
}

#[tokio::test]
async fn test_bastion_assets_are_written() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let cluster = sample_cluster();

    let generator = AssetGenerator::new();
    let plan = generator.generate_bastion_host(
        &cluster,
        &BastionRequest {
            allowed_cidrs: vec!["10.0.0.0/8".to_string()],
            instance_type: "t3.micro".to_string(),
        },
        "eu-west-1",
    )?;

    let output = temp_dir.path().join("bastion-host");
    AssetWriter::new(true).write(&plan, &output).await?;

    for name in ["main.tf", "variables.tf", "outputs.tf", "bastion_setup.sh", "README.md"] {
        assert!(output.join(name).exists(), "missing {}", name);
    }

    let main_tf = fs::read_to_string(output.join("main.tf")).await?;
    assert!(main_tf.contains("aws_instance"));
    assert!(main_tf.contains("aws_security_group"));
    assert!(main_tf.contains("vpc-1"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(output.join("bastion_setup.sh"))?
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    Ok(())
}

#[tokio::test]
async fn test_reverse_proxy_assets() -> Result<()> {
    let cluster = sample_cluster();
    let generator = AssetGenerator::new();

    let plan = generator.generate_reverse_proxy(
        &cluster,
        &ProxyRequest {
            allowed_cidrs: vec!["0.0.0.0/0".to_string()],
            domain: None,
        },
        "eu-west-1",
    )?;

    let nginx = plan
        .files
        .iter()
        .find(|f| f.path == "nginx.conf")
        .expect("nginx.conf in plan");
    assert!(nginx.content.contains("ssl_preread"));
    assert!(nginx
        .content
        .contains("b-1.payments.abc.kafka.eu-west-1.amazonaws.com"));

    Ok(())
}

#[test]
fn test_migration_infra_for_private_scram_cluster() -> Result<()> {
    let cluster = sample_cluster();
    let migration_type = MigrationType::recommend(&cluster)?;
    assert_eq!(migration_type, MigrationType::PrivateScramJumpCluster);

    let target = TargetPlanner::new("eu-west-1".to_string()).plan(&cluster)?;
    let generator = AssetGenerator::new();
    let plan =
        generator.generate_migration_infra(&cluster, &target, migration_type, "eu-west-1")?;

    assert_eq!(plan.name, "migration-infra");

    let paths: Vec<&str> = plan.files.iter().map(|f| f.path.as_str()).collect();
    assert!(paths.contains(&"main.tf"));
    assert!(paths.contains(&"jump_setup.sh"));

    let main_tf = &plan.files.iter().find(|f| f.path == "main.tf").unwrap().content;
    assert!(main_tf.contains("confluent_cluster_link"));
    assert!(main_tf.contains("payments-msk-link"));
    assert!(main_tf.contains("aws_instance"));

    let variables = &plan
        .files
        .iter()
        .find(|f| f.path == "variables.tf")
        .unwrap()
        .content;
    assert!(variables.contains("source_sasl_jaas_config"));

    let outputs = &plan
        .files
        .iter()
        .find(|f| f.path == "outputs.tf")
        .unwrap()
        .content;
    assert!(outputs.contains("cluster_link_name"));
    assert!(outputs.contains("kafka_rest_endpoint"));

    Ok(())
}

#[tokio::test]
async fn test_migrate_topics_reads_terraform_outputs() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let tfstate_file = temp_dir.path().join("terraform.tfstate");
    fs::write(
        &tfstate_file,
        r#"{
            "outputs": {
                "cluster_link_name": { "value": "payments-msk-link" },
                "kafka_cluster_id": { "value": "lkc-abc123" },
                "kafka_rest_endpoint": { "value": "https://pkc-1.eu-west-1.aws.confluent.cloud:443" }
            }
        }"#,
    )
    .await?;

    let tfstate = TerraformState::load(&tfstate_file).await?;
    let cluster = sample_cluster();
    let plan = AssetGenerator::new().generate_migrate_topics(&cluster, &tfstate, false)?;

    let mirror_tf = &plan
        .files
        .iter()
        .find(|f| f.path == "mirror_topics.tf")
        .unwrap()
        .content;
    assert!(mirror_tf.contains("payments.events"));
    assert!(mirror_tf.contains("payments-msk-link"));
    assert!(mirror_tf.contains("lkc-abc123"));
    // Internal topics stay out unless asked for
    assert!(!mirror_tf.contains("__consumer_offsets"));

    let with_internal = AssetGenerator::new().generate_migrate_topics(&cluster, &tfstate, true)?;
    let mirror_tf = &with_internal
        .files
        .iter()
        .find(|f| f.path == "mirror_topics.tf")
        .unwrap()
        .content;
    assert!(mirror_tf.contains("__consumer_offsets"));

    Ok(())
}

#[tokio::test]
async fn test_connector_migration_isolates_failures() -> Result<()> {
    // Port 9 is unassigned; every translate call fails without aborting the run
    let client = TranslateClient::new(
        "http://127.0.0.1:9",
        "env-123",
        "lkc-123",
        "key",
        "secret",
    );
    let migrator = ConnectorMigrator::new(client);

    let connectors = vec![
        ConnectorState {
            name: "s3-archive".to_string(),
            connector_class: "io.confluent.connect.s3.S3SinkConnector".to_string(),
            tasks_max: 2,
            config: HashMap::from([(
                "connector.class".to_string(),
                "io.confluent.connect.s3.S3SinkConnector".to_string(),
            )]),
        },
        ConnectorState {
            name: "homegrown".to_string(),
            connector_class: "com.example.HomegrownConnector".to_string(),
            tasks_max: 1,
            config: HashMap::new(),
        },
    ];

    let summary = migrator.migrate_all(&connectors).await?;
    assert!(summary.translated.is_empty());
    assert_eq!(summary.skipped.len(), 2);

    let skipped: Vec<&str> = summary.skipped.iter().map(|s| s.name.as_str()).collect();
    assert!(skipped.contains(&"s3-archive"));
    assert!(skipped.contains(&"homegrown"));

    // A summary with no translations still renders a connector asset plan
    let plan = AssetGenerator::new().generate_migrate_connectors(
        &summary,
        &ConnectorInfraRequest {
            environment_id: "env-123".to_string(),
            cluster_id: "lkc-123".to_string(),
        },
    )?;
    let readme = &plan
        .files
        .iter()
        .find(|f| f.path == "README.md")
        .unwrap()
        .content;
    assert!(readme.contains("homegrown"));

    Ok(())
}

#[test]
fn test_cli_help_lists_subcommands() {
    Command::cargo_bin("kcp")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("create-asset"));
}

#[test]
fn test_cli_create_asset_help() {
    Command::cargo_bin("kcp")
        .unwrap()
        .args(["create-asset", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bastion-host"))
        .stdout(predicate::str::contains("migration-infra"))
        .stdout(predicate::str::contains("migrate-topics"));
}

#[test]
fn test_cli_scan_missing_input_fails() {
    let temp_dir = TempDir::new().unwrap();
    Command::cargo_bin("kcp")
        .unwrap()
        .args([
            "scan",
            "--input",
            "/nonexistent/discovery",
            "--state",
            temp_dir.path().join("state.json").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
