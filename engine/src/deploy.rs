/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Deployment activation, stop, and delete.
//!
//! Everything here runs under the owning project's mutex so the
//! pid file, `current` symlink, and port never disagree.

use anyhow::{bail, Context, Result};
use slipway_core::deployer::{ActivateRequest, DeleteProjectRequest, StopRequest};
use entity::log_entry::LogLevel;
use entity::project::Framework;
use flate2::read::GzDecoder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::docker;
use super::entrypoint::backend_start_command;
use super::nginx;
use super::process::{
    ensure_dependencies, health_check, kill_port_listeners, kill_recorded_process,
    start_application, wait_for_port_free,
};
use super::static_files::{serve_static_site, static_root};
use super::types::{EngineState, StaticServerHandle};

const EXTRACT_ATTEMPTS: u32 = 3;
const EXTRACT_BACKOFF: Duration = Duration::from_millis(300);
const PROCESS_HEALTH_TIMEOUT: Duration = Duration::from_secs(15);

pub struct DeployPaths {
    pub artifact: PathBuf,
    pub project_dir: PathBuf,
    pub build_dir: PathBuf,
}

impl DeployPaths {
    pub fn new(state: &EngineState, project_id: Uuid, build_id: Uuid) -> Self {
        let project_dir = state.cli.apps_dir.join(project_id.to_string());

        Self {
            artifact: state
                .cli
                .artifacts_dir
                .join(format!("{}.tar.gz", build_id)),
            build_dir: project_dir.join("builds").join(build_id.to_string()),
            project_dir,
        }
    }
}

pub async fn activate(state: &Arc<EngineState>, req: ActivateRequest) -> Result<()> {
    let _guard = state.lock_project(req.project_id).await;

    let build_id = req.build_id;
    state
        .stream_log(build_id, "Starting deployment activation...", LogLevel::Info)
        .await;

    let paths = DeployPaths::new(state, req.project_id, build_id);

    if !paths.artifact.is_file() {
        let message = format!("Artifact not found: {}", paths.artifact.display());
        state.stream_log(build_id, &message, LogLevel::Error).await;
        bail!(message);
    }

    state
        .stream_log(build_id, "Extracting artifact...", LogLevel::Info)
        .await;

    if let Err(e) = extract_artifact(&paths.artifact, &paths.build_dir).await {
        state
            .stream_log(build_id, &format!("Failed to extract artifact: {:#}", e), LogLevel::Error)
            .await;
        return Err(e);
    }

    state
        .stream_log(build_id, "Updating deployment symlink...", LogLevel::Info)
        .await;

    if let Err(e) = rotate_symlink(&paths.project_dir, &paths.build_dir, build_id).await {
        state
            .stream_log(build_id, &format!("Failed to update symlink: {:#}", e), LogLevel::Error)
            .await;
        return Err(e);
    }

    let current_dir = tokio::fs::canonicalize(paths.project_dir.join("current"))
        .await
        .context("Failed to resolve current symlink")?;

    let result = if state.cli.use_docker {
        activate_with_docker(state, &req, &current_dir).await
    } else {
        activate_with_process(state, &req, &current_dir, &paths).await
    };

    if result.is_ok() {
        configure_proxy(state, &req).await;
        state
            .stream_log(build_id, "Deployment activated successfully!", LogLevel::Success)
            .await;
    }

    result
}

async fn activate_with_docker(
    state: &Arc<EngineState>,
    req: &ActivateRequest,
    current_dir: &Path,
) -> Result<()> {
    state
        .stream_log(req.build_id, "Using Docker deployment mode...", LogLevel::Info)
        .await;

    docker::deploy(
        state,
        req.project_id,
        req.build_id,
        current_dir,
        req.port,
        req.app_type,
        &req.env_vars,
    )
    .await
}

async fn activate_with_process(
    state: &Arc<EngineState>,
    req: &ActivateRequest,
    current_dir: &Path,
    paths: &DeployPaths,
) -> Result<()> {
    let build_id = req.build_id;

    let static_mode = req.app_type == Framework::Vite
        || (req.app_type == Framework::NextJs && current_dir.join("out").is_dir());

    state
        .stream_log(build_id, "Stopping existing process...", LogLevel::Info)
        .await;
    state.stop_static_server(req.project_id);
    kill_recorded_process(&paths.project_dir).await;

    if let Err(e) = wait_for_port_free(req.port).await {
        state
            .stream_log(build_id, &format!("Port {} not available: {:#}", req.port, e), LogLevel::Error)
            .await;
        return Err(e);
    }

    if static_mode {
        state
            .stream_log(build_id, "Static build detected, using static server...", LogLevel::Info)
            .await;

        let root = static_root(current_dir, req.app_type);
        if !root.is_dir() {
            let message = format!("Static output directory missing: {}", root.display());
            state.stream_log(build_id, &message, LogLevel::Error).await;
            bail!(message);
        }

        let handle = serve_static_site(root, req.port)
            .await
            .context("Failed to bind static server")?;

        state.static_servers.lock().unwrap().insert(
            req.project_id,
            StaticServerHandle {
                port: req.port,
                handle,
            },
        );
    } else {
        if req.app_type.requires_install() {
            state
                .stream_log(build_id, "Installing dependencies...", LogLevel::Info)
                .await;

            if let Err(e) = ensure_dependencies(state, current_dir).await {
                state
                    .stream_log(build_id, &format!("Failed to install dependencies: {:#}", e), LogLevel::Error)
                    .await;
                return Err(e);
            }
        }

        state
            .stream_log(build_id, "Starting application...", LogLevel::Info)
            .await;

        let command = start_command(state, req.app_type, current_dir, req.port);

        if let Err(e) = start_application(
            state,
            current_dir,
            &paths.project_dir,
            build_id,
            req.port,
            &command,
            &req.env_vars,
        )
        .await
        {
            state
                .stream_log(build_id, &format!("Failed to start application: {:#}", e), LogLevel::Error)
                .await;
            return Err(e);
        }
    }

    state
        .stream_log(build_id, "Performing health check...", LogLevel::Info)
        .await;

    if let Err(e) = health_check(state, req.port, PROCESS_HEALTH_TIMEOUT).await {
        state
            .stream_log(build_id, &format!("Health check failed: {:#}", e), LogLevel::Error)
            .await;
        return Err(e);
    }

    Ok(())
}

fn start_command(
    state: &Arc<EngineState>,
    framework: Framework,
    cwd: &Path,
    port: i32,
) -> Vec<String> {
    let bun = &state.cli.binpath_bun;

    match framework {
        Framework::NextJs => vec![
            bun.clone(),
            "run".to_string(),
            "start".to_string(),
            "--".to_string(),
            "--port".to_string(),
            port.to_string(),
        ],
        _ => backend_start_command(cwd, bun),
    }
}

/// Proxy problems are warnings. The app is serving on its port; routing
/// can be repaired without another deployment.
async fn configure_proxy(state: &Arc<EngineState>, req: &ActivateRequest) {
    let Some(subdomain) = req.subdomain.as_deref().filter(|s| !s.is_empty()) else {
        return;
    };

    if !state.cli.is_production() {
        return;
    }

    state
        .stream_log(req.build_id, "Configuring nginx...", LogLevel::Info)
        .await;

    if let Err(e) = nginx::create_config(state, subdomain, req.port).await {
        state
            .stream_log(req.build_id, &format!("Failed to configure nginx: {:#}", e), LogLevel::Warning)
            .await;
    }
}

pub async fn stop(state: &Arc<EngineState>, req: StopRequest) -> Result<()> {
    let _guard = match req.project_id {
        Some(project_id) => Some(state.lock_project(project_id).await),
        None => None,
    };

    if let Some(build_id) = req.build_id {
        state
            .stream_log(build_id, "Stopping deployment...", LogLevel::Info)
            .await;
    }

    match req.project_id {
        Some(project_id) => {
            if state.cli.use_docker {
                docker::ensure_container_stopped(state, project_id).await;
            } else {
                state.stop_static_server(project_id);
                let project_dir = state.cli.apps_dir.join(project_id.to_string());
                kill_recorded_process(&project_dir).await;
            }
        }
        None if req.port > 0 => {
            kill_port_listeners(req.port).await;
        }
        None => {}
    }

    if let Some(build_id) = req.build_id {
        state
            .stream_log(build_id, "Deployment stopped", LogLevel::Success)
            .await;
    }

    Ok(())
}

pub async fn delete_project(
    state: &Arc<EngineState>,
    project_id: Uuid,
    req: DeleteProjectRequest,
) -> Result<()> {
    let _guard = state.lock_project(project_id).await;

    if state.cli.use_docker {
        docker::ensure_container_stopped(state, project_id).await;
        docker::remove_project_images(state, project_id, &req.build_ids).await;
    } else {
        state.stop_static_server(project_id);
        let project_dir = state.cli.apps_dir.join(project_id.to_string());
        kill_recorded_process(&project_dir).await;
    }

    if let Some(subdomain) = req.subdomain.as_deref().filter(|s| !s.is_empty()) {
        if let Err(e) = nginx::remove_config(state, subdomain).await {
            tracing::warn!(project = %project_id, error = %e, "Failed to remove nginx config");
        }
    }

    for build_id in &req.build_ids {
        let artifact = state
            .cli
            .artifacts_dir
            .join(format!("{}.tar.gz", build_id));
        let _ = tokio::fs::remove_file(artifact).await;
    }

    let project_dir = state.cli.apps_dir.join(project_id.to_string());
    if project_dir.exists() {
        tokio::fs::remove_dir_all(&project_dir)
            .await
            .with_context(|| format!("Failed to remove {}", project_dir.display()))?;
    }

    tracing::info!(project = %project_id, "Project removed from engine");

    Ok(())
}

/// Unpacks the gzipped tar into the build directory. Retried a few times
/// with backoff; artifact uploads and activations can race by a moment.
async fn extract_artifact(artifact: &Path, target: &Path) -> Result<()> {
    let mut last_error = None;

    for attempt in 0..EXTRACT_ATTEMPTS {
        if attempt > 0 {
            tokio::time::sleep(EXTRACT_BACKOFF).await;
        }

        let artifact = artifact.to_path_buf();
        let target = target.to_path_buf();

        let result = tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&target)?;

            let file = std::fs::File::open(&artifact)?;
            let mut archive = tar::Archive::new(GzDecoder::new(file));
            archive.unpack(&target)?;

            Ok(())
        })
        .await
        .context("Extraction task panicked")?;

        match result {
            Ok(()) => return Ok(()),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("tar extraction failed")))
}

/// Swaps `current` to the new build without a window where the link is
/// missing: build a temp symlink, then rename over the old one. Readers
/// see the previous target or the new one, nothing else.
async fn rotate_symlink(project_dir: &Path, target: &Path, build_id: Uuid) -> Result<()> {
    tokio::fs::create_dir_all(project_dir)
        .await
        .context("Failed to create project directory")?;

    tokio::fs::write(project_dir.join("current_build_id"), build_id.to_string())
        .await
        .context("Failed to record current build id")?;

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let temp_link = project_dir.join(format!(".current_tmp_{}", nanos));
    let current_link = project_dir.join("current");

    let _ = tokio::fs::remove_file(&temp_link).await;

    let absolute_target = tokio::fs::canonicalize(target)
        .await
        .context("Failed to resolve build directory")?;

    tokio::fs::symlink(&absolute_target, &temp_link)
        .await
        .context("Failed to create temp symlink")?;

    if let Err(e) = tokio::fs::rename(&temp_link, &current_link).await {
        let _ = tokio::fs::remove_file(&temp_link).await;
        return Err(e).context("Failed to rename symlink");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("slipway-deploy-tests")
            .join(format!("{}-{}", name, Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn symlink_rotation_swaps_targets() {
        let root = scratch_dir("rotate");
        let project_dir = root.join("project");

        let first = root.join("builds/one");
        let second = root.join("builds/two");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();

        let first_build = Uuid::new_v4();
        rotate_symlink(&project_dir, &first, first_build).await.unwrap();

        let current = project_dir.join("current");
        assert_eq!(
            fs::canonicalize(&current).unwrap(),
            fs::canonicalize(&first).unwrap()
        );
        assert_eq!(
            fs::read_to_string(project_dir.join("current_build_id")).unwrap(),
            first_build.to_string()
        );

        let second_build = Uuid::new_v4();
        rotate_symlink(&project_dir, &second, second_build).await.unwrap();

        assert_eq!(
            fs::canonicalize(&current).unwrap(),
            fs::canonicalize(&second).unwrap()
        );
        assert_eq!(
            fs::read_to_string(project_dir.join("current_build_id")).unwrap(),
            second_build.to_string()
        );

        fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn rotation_never_leaves_current_missing() {
        let root = scratch_dir("atomic");
        let project_dir = root.join("project");

        let first = root.join("builds/one");
        let second = root.join("builds/two");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();

        rotate_symlink(&project_dir, &first, Uuid::new_v4()).await.unwrap();

        let current = project_dir.join("current");
        let reader = {
            let current = current.clone();
            tokio::task::spawn_blocking(move || {
                // Hammer the link while it rotates; every read must
                // resolve to one of the two builds.
                let mut seen = Vec::new();
                for _ in 0..500 {
                    let target = fs::canonicalize(&current).expect("current must always resolve");
                    seen.push(target);
                }
                seen
            })
        };

        for _ in 0..20 {
            rotate_symlink(&project_dir, &second, Uuid::new_v4()).await.unwrap();
            rotate_symlink(&project_dir, &first, Uuid::new_v4()).await.unwrap();
        }

        let seen = reader.await.unwrap();
        let first_canon = fs::canonicalize(&first).unwrap();
        let second_canon = fs::canonicalize(&second).unwrap();

        for target in seen {
            assert!(target == first_canon || target == second_canon);
        }

        fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn extract_round_trips_an_archive() {
        let root = scratch_dir("extract");

        // Build a small artifact by hand.
        let source = root.join("source");
        fs::create_dir_all(source.join("dist")).unwrap();
        fs::write(source.join("dist/index.html"), b"<h1>hi</h1>").unwrap();
        fs::write(source.join("package.json"), b"{}").unwrap();

        let artifact = root.join("artifact.tar.gz");
        {
            let file = fs::File::create(&artifact).unwrap();
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            builder.append_dir_all("dist", source.join("dist")).unwrap();
            builder
                .append_path_with_name(source.join("package.json"), "package.json")
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let target = root.join("extracted");
        extract_artifact(&artifact, &target).await.unwrap();

        assert_eq!(
            fs::read_to_string(target.join("dist/index.html")).unwrap(),
            "<h1>hi</h1>"
        );
        assert!(target.join("package.json").is_file());

        fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn extract_fails_for_missing_artifact() {
        let root = scratch_dir("missing");

        let result = extract_artifact(&root.join("nope.tar.gz"), &root.join("out")).await;
        assert!(result.is_err());

        fs::remove_dir_all(root).unwrap();
    }
}
