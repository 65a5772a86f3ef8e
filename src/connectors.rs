use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state::ConnectorState;

/// Maps an MSK Connect connector class to the Confluent Cloud managed plugin that
/// replaces it. Classes without a managed equivalent are an error and the caller
/// decides whether to skip.
pub fn infer_plugin_name(connector_class: &str) -> Result<&'static str> {
    match connector_class {
        "io.confluent.connect.s3.S3SinkConnector" => Ok("S3_SINK"),
        "io.debezium.connector.mysql.MySqlConnector" => Ok("MySqlCdcSource"),
        "io.debezium.connector.postgresql.PostgresConnector" => Ok("PostgresCdcSource"),
        "io.confluent.connect.elasticsearch.ElasticsearchSinkConnector" => {
            Ok("ElasticsearchSink")
        }
        "com.mongodb.kafka.connect.MongoSinkConnector" => Ok("MongoDbAtlasSink"),
        "com.mongodb.kafka.connect.MongoSourceConnector" => Ok("MongoDbAtlasSource"),
        "com.snowflake.kafka.connector.SnowflakeSinkConnector" => Ok("SnowflakeSink"),
        _ => Err(anyhow::anyhow!(
            "No Confluent Cloud plugin mapping for connector class `{}`",
            connector_class
        )),
    }
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    config: &'a HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslatedConfig {
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Client for the Confluent Cloud connector config translation endpoint.
pub struct TranslateClient {
    http: reqwest::Client,
    base_url: String,
    environment: String,
    cluster: String,
    api_key: String,
    api_secret: String,
}

impl TranslateClient {
    pub fn new(
        base_url: impl Into<String>,
        environment: impl Into<String>,
        cluster: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            environment: environment.into(),
            cluster: cluster.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub async fn translate(
        &self,
        plugin_name: &str,
        config: &HashMap<String, String>,
    ) -> Result<TranslatedConfig> {
        let url = format!(
            "{}/connect/v1/environments/{}/clusters/{}/connector-plugins/{}/config/translate",
            self.base_url.trim_end_matches('/'),
            self.environment,
            self.cluster,
            plugin_name
        );

        let response = self
            .http
            .put(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&TranslateRequest { config })
            .send()
            .await
            .context("Translate request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Translate API returned {} for plugin {}: {}",
                status,
                plugin_name,
                body
            ));
        }

        response
            .json::<TranslatedConfig>()
            .await
            .context("Failed to decode translate response")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectorMigration {
    pub name: String,
    pub plugin_name: String,
    pub config: HashMap<String, String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedConnector {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectorMigrationSummary {
    pub translated: Vec<ConnectorMigration>,
    pub skipped: Vec<SkippedConnector>,
}

pub struct ConnectorMigrator {
    client: TranslateClient,
}

impl ConnectorMigrator {
    pub fn new(client: TranslateClient) -> Self {
        Self { client }
    }

    /// Translates every connector, isolating failures: a connector whose class has no
    /// plugin mapping or whose translate call fails is logged and skipped, and the
    /// remaining connectors are still processed.
    pub async fn migrate_all(
        &self,
        connectors: &[ConnectorState],
    ) -> Result<ConnectorMigrationSummary> {
        let mut summary = ConnectorMigrationSummary::default();

        let progress = ProgressBar::new(connectors.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        for connector in connectors {
            progress.set_message(connector.name.clone());

            match self.migrate_one(connector).await {
                Ok(migration) => summary.translated.push(migration),
                Err(err) => {
                    log::warn!("Skipping connector `{}`: {:#}", connector.name, err);
                    summary.skipped.push(SkippedConnector {
                        name: connector.name.clone(),
                        reason: format!("{:#}", err),
                    });
                }
            }

            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok(summary)
    }

    async fn migrate_one(&self, connector: &ConnectorState) -> Result<ConnectorMigration> {
        let plugin_name = infer_plugin_name(&connector.connector_class)?;
        let translated = self
            .client
            .translate(plugin_name, &connector.config)
            .await?;

        Ok(ConnectorMigration {
            name: connector.name.clone(),
            plugin_name: plugin_name.to_string(),
            config: translated.config,
            warnings: translated.warnings,
        })
    }
}

pub fn print_migration_summary(summary: &ConnectorMigrationSummary) {
    println!("{}", "Connector translation summary".bold().blue());
    println!(
        "  Translated: {}  Skipped: {}",
        summary.translated.len().to_string().green(),
        summary.skipped.len().to_string().yellow()
    );

    for migration in &summary.translated {
        println!(
            "  {} {} {} {}",
            "•".green(),
            migration.name.bold(),
            "→".dimmed(),
            migration.plugin_name.cyan()
        );
        for warning in &migration.warnings {
            println!("      {} {}", "!".yellow(), warning);
        }
    }

    for skipped in &summary.skipped {
        println!(
            "  {} {} ({})",
            "•".yellow(),
            skipped.name.bold(),
            skipped.reason.dimmed()
        );
    }
}
