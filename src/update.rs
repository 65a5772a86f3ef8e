use anyhow::{Context, Result};
use colored::*;
use serde::Deserialize;

const RELEASES_URL: &str = "https://api.github.com/repos/kcp-tools/kcp/releases/latest";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LatestRelease {
    pub tag_name: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    UpdateAvailable(LatestRelease),
}

pub struct ReleaseChecker {
    http: reqwest::Client,
    releases_url: String,
}

impl Default for ReleaseChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseChecker {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            releases_url: RELEASES_URL.to_string(),
        }
    }

    pub fn with_releases_url(mut self, url: impl Into<String>) -> Self {
        self.releases_url = url.into();
        self
    }

    pub async fn check(&self, current_version: &str) -> Result<UpdateStatus> {
        let release: LatestRelease = self
            .http
            .get(&self.releases_url)
            .header("User-Agent", format!("kcp/{}", current_version))
            .send()
            .await
            .context("Failed to query the releases API")?
            .error_for_status()
            .context("Releases API returned an error")?
            .json()
            .await
            .context("Failed to decode release metadata")?;

        if is_newer(&release.tag_name, current_version) {
            Ok(UpdateStatus::UpdateAvailable(release))
        } else {
            Ok(UpdateStatus::UpToDate)
        }
    }

    pub fn print_status(&self, current_version: &str, status: &UpdateStatus) {
        match status {
            UpdateStatus::UpToDate => {
                println!(
                    "{}",
                    format!("kcp {} is up to date.", current_version).green()
                );
            }
            UpdateStatus::UpdateAvailable(release) => {
                println!(
                    "{}",
                    format!(
                        "A newer kcp release is available: {} (you have {}).",
                        release.tag_name, current_version
                    )
                    .yellow()
                );
                println!("Download it from {}", release.html_url.cyan());
            }
        }
    }
}

/// Compares dotted version strings numerically, ignoring a leading `v` and treating
/// missing components as zero.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    let parse = |v: &str| -> Vec<u32> {
        v.trim_start_matches('v')
            .split('.')
            .map(|c| c.parse().unwrap_or(0))
            .collect()
    };

    let candidate = parse(candidate);
    let current = parse(current);
    let len = candidate.len().max(current.len());

    for i in 0..len {
        let a = candidate.get(i).copied().unwrap_or(0);
        let b = current.get(i).copied().unwrap_or(0);
        if a != b {
            return a > b;
        }
    }

    false
}
