/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{bail, Context, Result};
use slipway_core::github::{clone_url_with_token, AppAuth};
use slipway_core::logsink::LogSink;
use slipway_core::queue::BuildJobData;
use entity::build::BuildStatus;
use entity::log_entry::LogLevel;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

use super::commands::{contains_build_tool, rewrite_build_command, run_command};
use super::logstream::LogStreamer;
use super::packaging::{create_artifact, upload_artifact};
use super::types::WorkerState;

#[derive(Deserialize, Default)]
struct PackageJson {
    #[serde(default)]
    scripts: HashMap<String, String>,
}

/// Executes one build job end to end. Errors are already reported to the
/// control plane (status + log stream) by the time this returns.
pub async fn run_build_job(state: &Arc<WorkerState>, job: BuildJobData) -> Result<()> {
    let sink: Arc<dyn LogSink> = Arc::new(state.sink.clone());
    let streamer = LogStreamer::new(sink, job.build_id);

    let workspace = PathBuf::from(&state.cli.base_path)
        .join("workspace")
        .join(job.build_id.to_string());

    let result = execute(state, &job, &workspace, &streamer).await;

    match &result {
        Ok(()) => {
            put_status(state, &job, BuildStatus::Success).await;
        }
        Err(e) => {
            streamer.push(LogLevel::Error, format!("Build failed: {:#}", e)).await;
            put_status(state, &job, BuildStatus::Failed).await;
        }
    }

    streamer.close().await;
    remove_workspace(&workspace).await;

    result
}

async fn execute(
    state: &Arc<WorkerState>,
    job: &BuildJobData,
    workspace: &Path,
    streamer: &LogStreamer,
) -> Result<()> {
    put_status(state, job, BuildStatus::Building).await;
    streamer
        .info(format!("Starting build for {}", job.repo_url))
        .await;

    let clone_url = match job.installation_id {
        Some(installation_id) => {
            let token = installation_token(state, installation_id, streamer).await?;
            clone_url_with_token(&job.repo_url, &token)
        }
        None => job.repo_url.clone(),
    };

    clone_repository(state, job, &clone_url, workspace, streamer).await?;

    let project_dir = workspace.join(job.root_directory.trim_start_matches("./"));
    if !project_dir.is_dir() {
        bail!("Root directory {} does not exist in repository", job.root_directory);
    }

    let build_command = rewrite_build_command(&job.build_command);

    let needs_build =
        job.framework.is_frontend() || should_build_backend(&job.build_command, &project_dir);

    if needs_build {
        streamer.info("Installing dependencies...").await;
        run_command(
            &format!("{} install", state.cli.binpath_bun),
            &project_dir,
            &job.env_vars,
            streamer,
        )
        .await?;

        streamer.info("Running build command...").await;
        run_command(&build_command, &project_dir, &job.env_vars, streamer).await?;
    } else {
        streamer
            .info("No compilation step detected, packaging source as-is")
            .await;
    }

    streamer.info("Packaging artifact...").await;

    let artifact_path = {
        let project_dir = project_dir.clone();
        let workspace = workspace.to_path_buf();
        let build_id = job.build_id;
        let framework = job.framework;

        tokio::task::spawn_blocking(move || {
            create_artifact(&project_dir, &workspace, build_id, framework)
        })
        .await
        .context("Packaging task panicked")??
    };

    streamer.info("Uploading artifact to deploy engine...").await;
    upload_artifact(&state.http, &state.cli.deploy_engine_url, job.build_id, &artifact_path)
        .await?;

    streamer
        .push(LogLevel::Success, "Build completed successfully")
        .await;

    Ok(())
}

/// Backends only get an install + build pass when the command names a real
/// compilation tool and the package declares a build script. Everything
/// else ships source directly and is started by the engine.
fn should_build_backend(build_command: &str, project_dir: &Path) -> bool {
    if !contains_build_tool(build_command) {
        return false;
    }

    read_package_json(project_dir)
        .map(|pkg| pkg.scripts.contains_key("build"))
        .unwrap_or(false)
}

fn read_package_json(project_dir: &Path) -> Option<PackageJson> {
    let raw = std::fs::read_to_string(project_dir.join("package.json")).ok()?;
    serde_json::from_str(&raw).ok()
}

async fn installation_token(
    state: &Arc<WorkerState>,
    installation_id: i64,
    streamer: &LogStreamer,
) -> Result<String> {
    let (app_id, key_path) = match (
        state.cli.github_app_id.as_deref(),
        state.cli.github_app_private_key_path.as_deref(),
    ) {
        (Some(app_id), Some(key_path)) => (app_id, key_path),
        _ => {
            streamer
                .error("Repository requires an installation token but the GitHub App is not configured")
                .await;
            bail!("GitHub App credentials not configured");
        }
    };

    streamer.info("Authenticating with source provider...").await;

    let auth = AppAuth::load(app_id, key_path)?;

    match auth.create_installation_token(&state.http, installation_id).await {
        Ok(token) => Ok(token),
        Err(e) => {
            streamer
                .error(format!("Failed to obtain installation token: {}", e))
                .await;
            Err(e)
        }
    }
}

async fn clone_repository(
    state: &Arc<WorkerState>,
    job: &BuildJobData,
    clone_url: &str,
    workspace: &Path,
    streamer: &LogStreamer,
) -> Result<()> {
    remove_workspace(workspace).await;

    if let Some(parent) = workspace.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create workspace directory")?;
    }

    streamer.info("Cloning repository...").await;

    let output = Command::new(&state.cli.binpath_git)
        .arg("clone")
        .arg("--depth")
        .arg("1")
        .arg(clone_url)
        .arg(workspace)
        .output()
        .await
        .context("Failed to execute git")?;

    if !output.status.success() {
        // The clone URL may carry a token; never echo it back.
        let stderr = String::from_utf8_lossy(&output.stderr).replace(clone_url, &job.repo_url);
        streamer
            .error(format!("git clone failed: {}", stderr.trim()))
            .await;
        bail!("git clone failed");
    }

    Ok(())
}

async fn put_status(state: &Arc<WorkerState>, job: &BuildJobData, status: BuildStatus) {
    if let Err(e) = state.sink.put_status(job.build_id, status).await {
        tracing::warn!(build = %job.build_id, status = %status, error = %e, "Status update failed");
    }
}

async fn remove_workspace(workspace: &Path) {
    if workspace.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(workspace).await {
            tracing::warn!(path = %workspace.display(), error = %e, "Failed to remove workspace");
        }
    }
}
