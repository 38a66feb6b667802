/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use super::input::{greater_than_zero, port_in_range};
use clap::Parser;
use entity::*;
use sea_orm::DatabaseConnection;
use std::path::PathBuf;
use std::time::Duration;

use super::deployer::HttpDeployer;
use super::logs::LogHub;
use super::queue::{BuildJobData, BuildQueue};

#[derive(Parser, Debug)]
#[command(name = "Slipway", display_name = "Slipway", bin_name = "slipway-server", author = "Wavelens", version, about, long_about = None)]
pub struct Cli {
    #[arg(long, env = "SLIPWAY_DEBUG", default_value = "false")]
    pub debug: bool,
    #[arg(long, env = "SLIPWAY_IP", default_value = "127.0.0.1")]
    pub ip: String,
    #[arg(long, env = "SLIPWAY_PORT", value_parser = port_in_range, default_value_t = 4000)]
    pub port: u16,
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,
    /// 32-byte AES-256 key, either raw or hex encoded.
    #[arg(long, env = "ENCRYPTION_KEY")]
    pub encryption_key: String,
    #[arg(long, env = "GITHUB_APP_ID")]
    pub github_app_id: Option<String>,
    #[arg(long, env = "GITHUB_APP_PRIVATE_KEY_PATH")]
    pub github_app_private_key_path: Option<String>,
    #[arg(long, env = "GITHUB_WEBHOOK_SECRET")]
    pub github_webhook_secret: Option<String>,
    #[arg(long, env = "CLIENT_URL", default_value = "http://localhost:3000")]
    pub client_url: String,
    #[arg(long, env = "DEPLOY_ENGINE_URL", default_value = "http://localhost:4002")]
    pub deploy_engine_url: String,
    #[arg(long, env = "BUILD_WORKER_URL", default_value = "http://localhost:4001")]
    pub build_worker_url: String,
    #[arg(long, env = "BASE_DOMAIN", default_value = "localhost")]
    pub base_domain: String,
    #[arg(long, env = "NODE_ENV", default_value = "development")]
    pub node_env: String,
    #[arg(long, env = "SLIPWAY_PORT_ALLOCATION_ATTEMPTS", value_parser = greater_than_zero::<usize>, default_value = "100")]
    pub port_allocation_attempts: usize,
}

impl Cli {
    pub fn is_production(&self) -> bool {
        self.node_env == "production"
    }
}

#[derive(Parser, Debug)]
#[command(name = "Slipway Builder", display_name = "Slipway Builder", bin_name = "slipway-builder", author = "Wavelens", version, about, long_about = None)]
pub struct WorkerCli {
    #[arg(long, env = "SLIPWAY_IP", default_value = "127.0.0.1")]
    pub ip: String,
    #[arg(long, env = "PORT", value_parser = port_in_range, default_value_t = 4001)]
    pub port: u16,
    #[arg(long, env = "CONTROL_API_URL", default_value = "http://localhost:4000")]
    pub control_api_url: String,
    #[arg(long, env = "DEPLOY_ENGINE_URL", default_value = "http://localhost:4002")]
    pub deploy_engine_url: String,
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,
    /// Workspaces are created under `<base_path>/workspace/<build_id>`.
    #[arg(long, env = "SLIPWAY_BASE_PATH", default_value = ".")]
    pub base_path: String,
    #[arg(long, env = "SLIPWAY_BINPATH_GIT", default_value = "git")]
    pub binpath_git: String,
    #[arg(long, env = "SLIPWAY_BINPATH_BUN", default_value = "bun")]
    pub binpath_bun: String,
    #[arg(long, env = "GITHUB_APP_ID")]
    pub github_app_id: Option<String>,
    #[arg(long, env = "GITHUB_APP_PRIVATE_KEY_PATH")]
    pub github_app_private_key_path: Option<String>,
}

#[derive(Parser, Debug)]
#[command(name = "Slipway Engine", display_name = "Slipway Engine", bin_name = "slipway-engine", author = "Wavelens", version, about, long_about = None)]
pub struct EngineCli {
    #[arg(long, env = "SLIPWAY_IP", default_value = "0.0.0.0")]
    pub ip: String,
    #[arg(long, env = "PORT", value_parser = port_in_range, default_value_t = 4002)]
    pub port: u16,
    #[arg(long, env = "CONTROL_API_URL", default_value = "http://localhost:4000")]
    pub control_api_url: String,
    #[arg(long, env = "BASE_DOMAIN", default_value = "localhost")]
    pub base_domain: String,
    #[arg(long, env = "ARTIFACTS_DIR", default_value = "/tmp/deploy-artifacts")]
    pub artifacts_dir: PathBuf,
    #[arg(long, env = "APPS_DIR", default_value = "./apps")]
    pub apps_dir: PathBuf,
    #[arg(long, env = "NODE_ENV", default_value = "development")]
    pub node_env: String,
    #[arg(long, env = "USE_DOCKER", default_value = "false")]
    pub use_docker: bool,
    #[arg(long, env = "SLIPWAY_NGINX_SITES_DIR", default_value = "/etc/nginx/slipway-sites")]
    pub nginx_sites_dir: PathBuf,
    #[arg(long, env = "SLIPWAY_NGINX_ENABLED_DIR", default_value = "/etc/nginx/slipway-sites")]
    pub nginx_enabled_dir: PathBuf,
    #[arg(long, env = "SLIPWAY_BINPATH_BUN", default_value = "bun")]
    pub binpath_bun: String,
    #[arg(long, env = "SLIPWAY_BINPATH_DOCKER", default_value = "docker")]
    pub binpath_docker: String,
}

impl EngineCli {
    pub fn is_production(&self) -> bool {
        self.node_env == "production"
    }
}

#[derive(Debug)]
pub struct ServerState {
    pub db: DatabaseConnection,
    pub cli: Cli,
    pub encryption_key: [u8; 32],
    pub queue: BuildQueue,
    pub hub: LogHub,
    pub deployer: HttpDeployer,
    pub worker: WorkerClient,
    pub http: reqwest::Client,
}

/// Fallback trigger towards the build worker's HTTP surface, used when the
/// queue cannot accept a job. Fire-and-forget on the worker side.
#[derive(Debug, Clone)]
pub struct WorkerClient {
    base_url: String,
    http: reqwest::Client,
}

impl WorkerClient {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { base_url, http }
    }

    pub async fn trigger_build(&self, job: &BuildJobData) -> anyhow::Result<()> {
        let mut delay = Duration::from_secs(1);
        let mut last_error = None;

        for _ in 0..3 {
            match self
                .http
                .post(format!("{}/build", self.base_url))
                .json(job)
                .send()
                .await
            {
                Ok(res) if res.status().is_success() => return Ok(()),
                Ok(res) => {
                    last_error = Some(anyhow::anyhow!(
                        "build worker returned {}",
                        res.status()
                    ));
                }
                Err(e) => last_error = Some(e.into()),
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("build worker unreachable")))
    }
}

pub type EBuild = build::Entity;
pub type EDeployment = deployment::Entity;
pub type EEnvironmentVariable = environment_variable::Entity;
pub type EGithubInstallation = github_installation::Entity;
pub type ELogEntry = log_entry::Entity;
pub type EProject = project::Entity;

pub type MBuild = build::Model;
pub type MDeployment = deployment::Model;
pub type MEnvironmentVariable = environment_variable::Model;
pub type MGithubInstallation = github_installation::Model;
pub type MLogEntry = log_entry::Model;
pub type MProject = project::Model;

pub type ABuild = build::ActiveModel;
pub type ADeployment = deployment::ActiveModel;
pub type AEnvironmentVariable = environment_variable::ActiveModel;
pub type AGithubInstallation = github_installation::ActiveModel;
pub type ALogEntry = log_entry::ActiveModel;
pub type AProject = project::ActiveModel;

pub type CBuild = build::Column;
pub type CDeployment = deployment::Column;
pub type CEnvironmentVariable = environment_variable::Column;
pub type CGithubInstallation = github_installation::Column;
pub type CLogEntry = log_entry::Column;
pub type CProject = project::Column;
