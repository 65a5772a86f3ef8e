use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

mod assets;
mod connectors;
mod convert;
mod scan;
mod state;
mod terraform;
mod update;

use assets::{
    AssetGenerator, AssetWriter, BastionRequest, ConnectorInfraRequest, LinkStrategy,
    MigrationType, ProxyRequest, SchemaRequest, TargetInfraRequest,
};
use connectors::{ConnectorMigrator, TranslateClient};
use convert::TargetPlanner;
use scan::ClusterScanner;
use state::{ClusterState, MigrationState, TerraformState};
use update::ReleaseChecker;

#[derive(Parser)]
#[command(name = "kcp")]
#[command(about = "Migrate Amazon MSK clusters to Confluent Cloud")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize MSK discovery dumps into a migration state file
    Scan {
        /// Discovery dump file or directory of dump files
        #[arg(short, long, env = "KCP_INPUT")]
        input: PathBuf,
        /// Path of the state file to write
        #[arg(short, long, default_value = "kcp-state.json", env = "KCP_STATE")]
        state: PathBuf,
        /// AWS region override (otherwise derived from the dumps)
        #[arg(short, long, env = "KCP_REGION")]
        region: Option<String>,
        /// Output format (json, yaml, table)
        #[arg(short, long, default_value = "table", env = "KCP_FORMAT")]
        format: String,
    },
    /// Map discovered clusters to Confluent Cloud target specs
    Convert {
        /// Path of the state file
        #[arg(short, long, default_value = "kcp-state.json", env = "KCP_STATE")]
        state: PathBuf,
        /// Limit conversion to a single cluster ARN
        #[arg(long, env = "KCP_CLUSTER_ARN")]
        cluster_arn: Option<String>,
        /// Output format (json, yaml, table)
        #[arg(short, long, default_value = "table", env = "KCP_FORMAT")]
        format: String,
    },
    /// Check for a newer kcp release
    Update,
    /// Generate migration assets
    CreateAsset {
        #[command(subcommand)]
        asset: AssetCommands,
    },
}

#[derive(Subcommand)]
enum AssetCommands {
    /// Terraform for an EC2 bastion host inside the MSK VPC
    BastionHost {
        #[command(flatten)]
        common: CommonAssetArgs,
        /// CIDR blocks allowed to reach the bastion over SSH
        #[arg(long = "cidr", value_delimiter = ',', default_value = "10.0.0.0/8", env = "KCP_CIDR")]
        allowed_cidrs: Vec<String>,
        /// Bastion EC2 instance type
        #[arg(long, default_value = "t3.micro", env = "KCP_INSTANCE_TYPE")]
        instance_type: String,
    },
    /// Terraform and nginx config for a TCP reverse proxy in front of the brokers
    ReverseProxy {
        #[command(flatten)]
        common: CommonAssetArgs,
        /// CIDR blocks allowed to reach the proxy
        #[arg(long = "cidr", value_delimiter = ',', default_value = "0.0.0.0/0", env = "KCP_CIDR")]
        allowed_cidrs: Vec<String>,
        /// Optional DNS domain the proxy will serve
        #[arg(long, env = "KCP_DOMAIN")]
        domain: Option<String>,
    },
    /// Terraform for the Confluent Cloud side of the migration (cluster link et al.)
    MigrationInfra {
        #[command(flatten)]
        common: CommonAssetArgs,
        /// Link strategy (cluster-link, jump-cluster, private-link); recommended per
        /// cluster when omitted
        #[arg(long, env = "KCP_LINK")]
        link: Option<String>,
    },
    /// Mirror-topic Terraform and CLI script driven by a prior apply's outputs
    MigrateTopics {
        #[command(flatten)]
        common: CommonAssetArgs,
        /// terraform.tfstate written by the migration-infra apply
        #[arg(long, default_value = "terraform.tfstate", env = "KCP_TFSTATE")]
        tfstate: PathBuf,
        /// Also mirror internal topics (names starting with __)
        #[arg(long, env = "KCP_INCLUDE_INTERNAL")]
        include_internal: bool,
    },
    /// Export script for source schema registry subjects
    MigrateSchemas {
        #[command(flatten)]
        common: CommonAssetArgs,
        /// Source schema registry base URL
        #[arg(long, env = "KCP_REGISTRY_URL")]
        registry_url: String,
        /// Schema registry API key
        #[arg(long, env = "KCP_API_KEY")]
        api_key: String,
        /// Schema registry API secret
        #[arg(long, env = "KCP_API_SECRET")]
        api_secret: String,
    },
    /// Translate MSK Connect configs through the Confluent Cloud API
    MigrateConnectors {
        #[command(flatten)]
        common: CommonAssetArgs,
        /// Confluent Cloud environment id (env-xxxxx)
        #[arg(long, env = "KCP_ENVIRONMENT")]
        environment: String,
        /// Confluent Cloud cluster id (lkc-xxxxx)
        #[arg(long, env = "KCP_CLUSTER")]
        cluster: String,
        /// Confluent Cloud API key
        #[arg(long, env = "KCP_API_KEY")]
        api_key: String,
        /// Confluent Cloud API secret
        #[arg(long, env = "KCP_API_SECRET")]
        api_secret: String,
        /// Base URL of the Confluent Cloud API
        #[arg(long, default_value = "https://api.confluent.cloud", env = "KCP_TRANSLATE_URL")]
        translate_url: String,
    },
    /// Standalone Confluent Cloud environment and cluster (no link to the source)
    TargetInfra {
        #[command(flatten)]
        common: CommonAssetArgs,
        /// Display name of the Confluent Cloud environment
        #[arg(long, default_value = "msk-migration", env = "KCP_ENVIRONMENT_NAME")]
        environment_name: String,
        /// Target cloud provider
        #[arg(long, default_value = "AWS", env = "KCP_CLOUD")]
        cloud: String,
        /// Target region (defaults to the scanned region)
        #[arg(long, env = "KCP_TARGET_REGION")]
        region: Option<String>,
    },
}

#[derive(clap::Args)]
struct CommonAssetArgs {
    /// Path of the state file
    #[arg(short, long, default_value = "kcp-state.json", env = "KCP_STATE")]
    state: PathBuf,
    /// Output directory root for generated assets
    #[arg(short, long, default_value = "./kcp-assets", env = "KCP_OUTPUT")]
    output: PathBuf,
    /// Source cluster ARN (prompted when the state file has several clusters)
    #[arg(long, env = "KCP_CLUSTER_ARN")]
    cluster_arn: Option<String>,
    /// Skip interactive prompts
    #[arg(short, long, env = "KCP_YES")]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            input,
            state,
            region,
            format,
        } => {
            println!("{}", "Scanning MSK discovery dumps...".bold().blue());

            let mut scanner = ClusterScanner::new();
            if let Some(region) = region {
                scanner = scanner.with_region(region);
            }

            let migration_state = scanner.scan(&input).await?;
            migration_state.save(&state).await?;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&migration_state)?),
                "yaml" => println!("{}", serde_yaml::to_string(&migration_state)?),
                "table" => scanner.print_scan_table(&migration_state),
                _ => return Err(anyhow::anyhow!("Unsupported format: {}", format)),
            }

            println!(
                "{}",
                format!("State file written to {}", state.display())
                    .bold()
                    .green()
            );
        }

        Commands::Convert {
            state,
            cluster_arn,
            format,
        } => {
            println!(
                "{}",
                "Mapping clusters to Confluent Cloud targets...".bold().blue()
            );

            let migration_state = MigrationState::load(&state).await?;
            let planner = TargetPlanner::new(migration_state.region.clone());

            let specs = match &cluster_arn {
                Some(arn) => {
                    let cluster = migration_state
                        .find_cluster(arn)
                        .with_context(|| format!("No cluster with ARN {} in state file", arn))?;
                    vec![planner.plan(cluster)?]
                }
                None => planner.plan_all(&migration_state)?,
            };

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&specs)?),
                "yaml" => println!("{}", serde_yaml::to_string(&specs)?),
                "table" => planner.print_target_summary(&specs),
                _ => return Err(anyhow::anyhow!("Unsupported format: {}", format)),
            }
        }

        Commands::Update => {
            println!("{}", "Checking for kcp updates...".bold().blue());

            let checker = ReleaseChecker::new();
            let status = checker.check(env!("CARGO_PKG_VERSION")).await?;
            checker.print_status(env!("CARGO_PKG_VERSION"), &status);
        }

        Commands::CreateAsset { asset } => create_asset(asset).await?,
    }

    Ok(())
}

async fn create_asset(asset: AssetCommands) -> Result<()> {
    let generator = AssetGenerator::new();

    match asset {
        AssetCommands::BastionHost {
            common,
            allowed_cidrs,
            instance_type,
        } => {
            let migration_state = MigrationState::load(&common.state).await?;
            let cluster = pick_cluster(&migration_state, common.cluster_arn.as_deref())?;

            println!(
                "{}",
                format!("Generating bastion host assets for {}...", cluster.name)
                    .bold()
                    .blue()
            );

            let plan = generator.generate_bastion_host(
                cluster,
                &BastionRequest {
                    allowed_cidrs,
                    instance_type,
                },
                &migration_state.region,
            )?;
            write_plan(&plan, &common).await?;
        }

        AssetCommands::ReverseProxy {
            common,
            allowed_cidrs,
            domain,
        } => {
            let migration_state = MigrationState::load(&common.state).await?;
            let cluster = pick_cluster(&migration_state, common.cluster_arn.as_deref())?;

            println!(
                "{}",
                format!("Generating reverse proxy assets for {}...", cluster.name)
                    .bold()
                    .blue()
            );

            let plan = generator.generate_reverse_proxy(
                cluster,
                &ProxyRequest {
                    allowed_cidrs,
                    domain,
                },
                &migration_state.region,
            )?;
            write_plan(&plan, &common).await?;
        }

        AssetCommands::MigrationInfra { common, link } => {
            let migration_state = MigrationState::load(&common.state).await?;
            let cluster = pick_cluster(&migration_state, common.cluster_arn.as_deref())?;

            let migration_type = match link {
                Some(value) => {
                    let strategy = LinkStrategy::parse(&value)?;
                    let auth = preferred_auth(cluster)?;
                    MigrationType::from_parts(cluster.publicly_accessible, auth, strategy)?
                }
                None => MigrationType::recommend(cluster)?,
            };

            println!(
                "{}",
                format!(
                    "Generating migration infrastructure for {} using {}...",
                    cluster.name,
                    migration_type.describe()
                )
                .bold()
                .blue()
            );

            let target = TargetPlanner::new(migration_state.region.clone()).plan(cluster)?;
            let plan = generator.generate_migration_infra(
                cluster,
                &target,
                migration_type,
                &migration_state.region,
            )?;
            write_plan(&plan, &common).await?;
        }

        AssetCommands::MigrateTopics {
            common,
            tfstate,
            include_internal,
        } => {
            let migration_state = MigrationState::load(&common.state).await?;
            let cluster = pick_cluster(&migration_state, common.cluster_arn.as_deref())?;
            let terraform_state = TerraformState::load(&tfstate).await?;

            println!(
                "{}",
                format!("Generating topic mirroring assets for {}...", cluster.name)
                    .bold()
                    .blue()
            );

            let plan =
                generator.generate_migrate_topics(cluster, &terraform_state, include_internal)?;
            write_plan(&plan, &common).await?;
        }

        AssetCommands::MigrateSchemas {
            common,
            registry_url,
            api_key,
            api_secret,
        } => {
            println!("{}", "Generating schema export assets...".bold().blue());

            let plan = generator.generate_migrate_schemas(&SchemaRequest {
                registry_url,
                api_key,
                api_secret,
            })?;
            write_plan(&plan, &common).await?;
        }

        AssetCommands::MigrateConnectors {
            common,
            environment,
            cluster,
            api_key,
            api_secret,
            translate_url,
        } => {
            let migration_state = MigrationState::load(&common.state).await?;
            let source = pick_cluster(&migration_state, common.cluster_arn.as_deref())?;

            println!(
                "{}",
                format!(
                    "Translating {} connectors from {}...",
                    source.connectors.len(),
                    source.name
                )
                .bold()
                .blue()
            );

            let client =
                TranslateClient::new(translate_url, &environment, &cluster, api_key, api_secret);
            let migrator = ConnectorMigrator::new(client);
            let summary = migrator.migrate_all(&source.connectors).await?;

            connectors::print_migration_summary(&summary);

            let plan = generator.generate_migrate_connectors(
                &summary,
                &ConnectorInfraRequest {
                    environment_id: environment,
                    cluster_id: cluster,
                },
            )?;
            write_plan(&plan, &common).await?;
        }

        AssetCommands::TargetInfra {
            common,
            environment_name,
            cloud,
            region,
        } => {
            let migration_state = MigrationState::load(&common.state).await?;
            let cluster = pick_cluster(&migration_state, common.cluster_arn.as_deref())?;

            println!(
                "{}",
                format!("Generating target infrastructure for {}...", cluster.name)
                    .bold()
                    .blue()
            );

            let target = TargetPlanner::new(migration_state.region.clone()).plan(cluster)?;
            let plan = generator.generate_target_infra(
                &target,
                &TargetInfraRequest {
                    environment_name,
                    cloud,
                    region: region.unwrap_or_else(|| migration_state.region.clone()),
                },
            )?;
            write_plan(&plan, &common).await?;
        }
    }

    Ok(())
}

async fn write_plan(plan: &assets::AssetPlan, common: &CommonAssetArgs) -> Result<()> {
    let output = common.output.join(&plan.name);
    AssetWriter::new(common.yes).write(plan, &output).await
}

fn preferred_auth(cluster: &ClusterState) -> Result<assets::AuthMode> {
    if cluster.authentication.sasl_scram {
        Ok(assets::AuthMode::SaslScram)
    } else if cluster.authentication.sasl_iam {
        Ok(assets::AuthMode::SaslIam)
    } else if cluster.authentication.mtls {
        Ok(assets::AuthMode::Tls)
    } else {
        Err(anyhow::anyhow!(
            "Cluster {} has no supported client authentication mode",
            cluster.name
        ))
    }
}

fn pick_cluster<'a>(
    migration_state: &'a MigrationState,
    cluster_arn: Option<&str>,
) -> Result<&'a ClusterState> {
    if let Some(arn) = cluster_arn {
        return migration_state
            .find_cluster(arn)
            .with_context(|| format!("No cluster with ARN {} in state file", arn));
    }

    match migration_state.clusters.len() {
        0 => Err(anyhow::anyhow!("State file contains no clusters")),
        1 => Ok(&migration_state.clusters[0]),
        _ => {
            let names = migration_state.cluster_names();
            let selection = dialoguer::Select::new()
                .with_prompt("Select the source cluster")
                .items(&names)
                .default(0)
                .interact()
                .context("Cluster selection failed")?;
            Ok(&migration_state.clusters[selection])
        }
    }
}
