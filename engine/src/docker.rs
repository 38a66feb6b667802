/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Container deployment mode.
//!
//! Images are built from the extracted artifact with the docker CLI.
//! User Dockerfiles are sanitized for the platform's port and security
//! constraints; projects without one get a generated per-framework
//! Dockerfile. Containers carry discovery labels so log followers can be
//! re-attached after an engine restart.

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use entity::log_entry::LogLevel;
use entity::project::Framework;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use uuid::Uuid;

use super::process::health_check;
use super::types::EngineState;

const MEMORY_LIMIT: &str = "512m";
const CPU_LIMIT: &str = "0.5";
const IMAGES_TO_KEEP: usize = 3;
const CONTAINER_HEALTH_TIMEOUT: Duration = Duration::from_secs(30);

const PROJECT_LABEL: &str = "slipway.projectId";
const BUILD_LABEL: &str = "slipway.buildId";

const VITE_INTERNAL_PORT: i32 = 80;
const DEFAULT_INTERNAL_PORT: i32 = 3000;

pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

pub fn container_name(project_id: Uuid) -> String {
    format!("slipway-{}", &project_id.to_string()[..8])
}

pub fn image_name(project_id: Uuid, build_id: Uuid) -> String {
    format!(
        "slipway-deploy/{}:{}",
        &project_id.to_string()[..8],
        &build_id.to_string()[..8]
    )
}

pub fn internal_port(framework: Framework) -> i32 {
    match framework {
        Framework::Vite => VITE_INTERNAL_PORT,
        _ => DEFAULT_INTERNAL_PORT,
    }
}

async fn exec_docker(state: &Arc<EngineState>, args: &[&str]) -> ExecResult {
    let output = Command::new(&state.cli.binpath_docker)
        .args(args)
        .output()
        .await;

    match output {
        Ok(output) => ExecResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(1),
        },
        Err(e) => ExecResult {
            stdout: String::new(),
            stderr: e.to_string(),
            exit_code: 1,
        },
    }
}

/// Runs a docker command and forwards its output lines into the build's
/// log stream (docker build reports progress on stderr).
async fn exec_docker_streamed(
    state: &Arc<EngineState>,
    build_id: Uuid,
    args: &[&str],
) -> Result<i32> {
    let mut child = Command::new(&state.cli.binpath_docker)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to spawn docker")?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let mut forwarders = Vec::new();
    for reader in [stdout.map(boxed_read), stderr.map(boxed_read)].into_iter().flatten() {
        let state = Arc::clone(state);
        forwarders.push(tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                state.stream_log(build_id, &line, LogLevel::Info).await;
            }
        }));
    }

    let status = child.wait().await.context("Failed to wait for docker")?;

    for forwarder in forwarders {
        let _ = forwarder.await;
    }

    Ok(status.code().unwrap_or(1))
}

fn boxed_read(
    reader: impl tokio::io::AsyncRead + Unpin + Send + 'static,
) -> Box<dyn tokio::io::AsyncRead + Unpin + Send> {
    Box::new(reader)
}

/// Rewrites a user Dockerfile to the platform's constraints: EXPOSE and
/// the PORT env pinned to the internal port, root/privilege escapes
/// neutralized with a comment prefix.
pub fn sanitize_dockerfile(content: &str, internal_port: i32) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut has_expose = false;
    let mut has_port_env = false;

    for line in content.lines() {
        let upper = line.trim().to_uppercase();

        if upper.contains("USER ROOT") || upper.contains("--PRIVILEGED") || upper.contains("DOCKER.SOCK")
        {
            lines.push(format!("# REMOVED FOR SECURITY: {}", line));
            continue;
        }

        if upper.starts_with("EXPOSE ") {
            has_expose = true;
            lines.push(format!("EXPOSE {}", internal_port));
            continue;
        }

        if upper.starts_with("ENV ") && upper.contains("PORT") {
            has_port_env = true;
            lines.push(rewrite_port_env(line, internal_port));
            continue;
        }

        lines.push(line.to_string());
    }

    if !has_port_env {
        let port_env = format!("ENV PORT={}", internal_port);
        let cmd_idx = lines.iter().position(|line| {
            let upper = line.trim().to_uppercase();
            upper.starts_with("CMD") || upper.starts_with("ENTRYPOINT")
        });

        match cmd_idx {
            Some(idx) => lines.insert(idx, port_env),
            None => lines.push(port_env),
        }
    }

    if !has_expose {
        lines.push(format!("EXPOSE {}", internal_port));
    }

    lines.join("\n")
}

fn rewrite_port_env(line: &str, internal_port: i32) -> String {
    static PORT_RE: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"PORT\s*=?\s*\d+").unwrap());

    PORT_RE
        .replace_all(line, format!("PORT={}", internal_port).as_str())
        .to_string()
}

/// Dockerfile for projects that do not ship one.
pub fn generate_dockerfile(
    framework: Framework,
    internal_port: i32,
    entry_file: Option<&str>,
) -> String {
    if framework == Framework::Vite {
        return r#"FROM nginx:alpine
COPY dist/ /usr/share/nginx/html
EXPOSE 80
CMD ["nginx", "-g", "daemon off;"]"#
            .to_string();
    }

    let cmd = match entry_file {
        Some(entry) => format!(r#"CMD ["bun", "run", "{}"]"#, entry),
        None => r#"CMD ["bun", "run", "start"]"#.to_string(),
    };

    format!(
        r#"FROM oven/bun:1-alpine AS builder
WORKDIR /app
COPY package.json ./
RUN bun install
COPY . .

FROM oven/bun:1-alpine
WORKDIR /app
COPY --from=builder /app .
ENV NODE_ENV=production
ENV PORT={port}
EXPOSE {port}
{cmd}"#,
        port = internal_port,
        cmd = cmd
    )
}

/// Full container activation: stop the previous container, build the
/// image, run it with resource limits and labels, health-check, prune old
/// images, attach a log follower.
pub async fn deploy(
    state: &Arc<EngineState>,
    project_id: Uuid,
    build_id: Uuid,
    source_dir: &Path,
    host_port: i32,
    framework: Framework,
    env_vars: &HashMap<String, String>,
) -> Result<()> {
    let name = container_name(project_id);
    let internal = internal_port(framework);

    state
        .stream_log(build_id, "Preparing container environment...", LogLevel::Info)
        .await;
    ensure_container_stopped(state, project_id).await;

    state
        .stream_log(build_id, "Building Docker image...", LogLevel::Info)
        .await;
    let image = build_image(state, project_id, build_id, source_dir, framework, internal).await?;

    state
        .stream_log(build_id, "Starting container...", LogLevel::Info)
        .await;
    run_container(state, project_id, build_id, &name, &image, host_port, internal, env_vars)
        .await?;

    state
        .stream_log(build_id, "Performing health check...", LogLevel::Info)
        .await;

    if let Err(e) = health_check(state, host_port, CONTAINER_HEALTH_TIMEOUT).await {
        let logs = container_logs(state, &name, 50).await;
        state
            .stream_log(build_id, &format!("Container logs:\n{}", logs), LogLevel::Warning)
            .await;
        state
            .stream_log(build_id, "Health check failed", LogLevel::Error)
            .await;

        stop_and_remove_container(state, &name).await;
        return Err(e);
    }

    state
        .stream_log(build_id, "Container deployed successfully!", LogLevel::Success)
        .await;

    prune_project_images(state, project_id).await;
    start_log_follower(state, project_id, build_id).await;

    Ok(())
}

async fn build_image(
    state: &Arc<EngineState>,
    project_id: Uuid,
    build_id: Uuid,
    source_dir: &Path,
    framework: Framework,
    internal_port: i32,
) -> Result<String> {
    let image = image_name(project_id, build_id);
    let dockerfile = source_dir.join("Dockerfile");

    let generated = if dockerfile.is_file() {
        let content = tokio::fs::read_to_string(&dockerfile).await?;
        tokio::fs::write(&dockerfile, sanitize_dockerfile(&content, internal_port)).await?;

        state
            .stream_log(build_id, "Using existing Dockerfile (sanitized)", LogLevel::Info)
            .await;
        false
    } else {
        let entry = super::entrypoint::detect_entry_file(source_dir);
        let content = generate_dockerfile(framework, internal_port, entry.as_deref());
        tokio::fs::write(&dockerfile, content).await?;

        state
            .stream_log(
                build_id,
                &format!("Generated Dockerfile for {}", framework),
                LogLevel::Info,
            )
            .await;
        true
    };

    let source = source_dir.to_string_lossy().to_string();
    let exit_code =
        exec_docker_streamed(state, build_id, &["build", "-t", &image, &source]).await?;

    if generated {
        let _ = tokio::fs::remove_file(&dockerfile).await;
    }

    if exit_code != 0 {
        bail!("Docker build failed with exit code {}", exit_code);
    }

    Ok(image)
}

#[allow(clippy::too_many_arguments)]
async fn run_container(
    state: &Arc<EngineState>,
    project_id: Uuid,
    build_id: Uuid,
    name: &str,
    image: &str,
    host_port: i32,
    internal_port: i32,
    env_vars: &HashMap<String, String>,
) -> Result<()> {
    let port_mapping = format!("{}:{}", host_port, internal_port);
    let project_label = format!("{}={}", PROJECT_LABEL, project_id);
    let build_label = format!("{}={}", BUILD_LABEL, build_id);

    let mut args: Vec<String> = vec![
        "run".into(),
        "-d".into(),
        "--name".into(),
        name.into(),
        "-p".into(),
        port_mapping,
        "--restart".into(),
        "unless-stopped".into(),
        "--memory".into(),
        MEMORY_LIMIT.into(),
        "--cpus".into(),
        CPU_LIMIT.into(),
        "--label".into(),
        project_label,
        "--label".into(),
        build_label,
        "-e".into(),
        "NODE_ENV=production".into(),
    ];

    for (key, value) in env_vars {
        args.push("-e".into());
        args.push(format!("{}={}", key, value));
    }

    if !env_vars.contains_key("PORT") {
        args.push("-e".into());
        args.push(format!("PORT={}", internal_port));
    }

    args.push(image.into());

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let result = exec_docker(state, &arg_refs).await;

    if result.exit_code != 0 {
        bail!(
            "Container failed to start: {}",
            if result.stderr.is_empty() {
                "unknown error"
            } else {
                result.stderr.trim()
            }
        );
    }

    Ok(())
}

pub async fn ensure_container_stopped(state: &Arc<EngineState>, project_id: Uuid) {
    stop_log_follower(state, project_id);

    let name = container_name(project_id);
    let exists = exec_docker(state, &["container", "inspect", &name]).await;

    if exists.exit_code == 0 {
        stop_and_remove_container(state, &name).await;
    }
}

async fn stop_and_remove_container(state: &Arc<EngineState>, name: &str) {
    let _ = exec_docker(state, &["stop", "-t", "10", name]).await;
    let _ = exec_docker(state, &["rm", "-f", name]).await;
}

pub async fn container_logs(state: &Arc<EngineState>, name: &str, tail: usize) -> String {
    let result = exec_docker(state, &["logs", "--tail", &tail.to_string(), name]).await;
    format!("{}{}", result.stdout, result.stderr)
}

/// Removes every image the project owns (used on project deletion).
pub async fn remove_project_images(
    state: &Arc<EngineState>,
    project_id: Uuid,
    build_ids: &[Uuid],
) {
    for build_id in build_ids {
        let image = image_name(project_id, *build_id);
        let _ = exec_docker(state, &["rmi", "-f", &image]).await;
    }
}

/// Keeps the newest images for a project, drops the rest.
pub async fn prune_project_images(state: &Arc<EngineState>, project_id: Uuid) {
    let reference = format!("slipway-deploy/{}:*", &project_id.to_string()[..8]);

    let result = exec_docker(
        state,
        &[
            "images",
            "--format",
            "{{.Repository}}:{{.Tag}} {{.CreatedAt}}",
            "--filter",
            &format!("reference={}", reference),
        ],
    )
    .await;

    if result.exit_code != 0 {
        return;
    }

    let mut images: Vec<(String, DateTime<chrono::FixedOffset>)> = Vec::new();

    for line in result.stdout.lines() {
        let Some((name, created)) = line.split_once(' ') else {
            continue;
        };

        // CreatedAt looks like `2026-01-15 10:30:00 +0000 UTC`; the
        // trailing zone name is redundant with the offset.
        let trimmed: Vec<&str> = created.split_whitespace().take(3).collect();
        if let Ok(date) =
            DateTime::parse_from_str(&trimmed.join(" "), "%Y-%m-%d %H:%M:%S %z")
        {
            images.push((name.to_string(), date));
        }
    }

    images.sort_by(|a, b| b.1.cmp(&a.1));

    for (name, _) in images.into_iter().skip(IMAGES_TO_KEEP) {
        let _ = exec_docker(state, &["rmi", "-f", &name]).await;
    }
}

/// Tails the container's output into the build log pipeline until
/// cancelled or the container goes away.
pub async fn start_log_follower(state: &Arc<EngineState>, project_id: Uuid, build_id: Uuid) {
    stop_log_follower(state, project_id);

    let name = container_name(project_id);
    let docker = state.cli.binpath_docker.clone();
    let follower_state = Arc::clone(state);

    let handle = tokio::spawn(async move {
        let child = Command::new(&docker)
            .args(["logs", "-f", "--tail", "0", &name])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let Ok(mut child) = child else {
            tracing::warn!(container = %name, "Failed to follow container logs");
            return;
        };

        let mut tasks = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            let state = Arc::clone(&follower_state);
            tasks.push(tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    state.stream_log(build_id, &line, LogLevel::Info).await;
                }
            }));
        }
        if let Some(stderr) = child.stderr.take() {
            let state = Arc::clone(&follower_state);
            tasks.push(tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    state.stream_log(build_id, &line, LogLevel::Info).await;
                }
            }));
        }

        let _ = child.wait().await;
        for task in tasks {
            let _ = task.await;
        }
    });

    state.log_followers.lock().unwrap().insert(project_id, handle);
}

pub fn stop_log_follower(state: &Arc<EngineState>, project_id: Uuid) {
    if let Some(handle) = state.log_followers.lock().unwrap().remove(&project_id) {
        handle.abort();
    }
}

/// Containers left running from before an engine restart get their log
/// followers back.
pub async fn recover_log_followers(state: &Arc<EngineState>) {
    let result = exec_docker(
        state,
        &[
            "ps",
            "--format",
            &format!("{{{{.Label \"{}\"}}}} {{{{.Label \"{}\"}}}}", PROJECT_LABEL, BUILD_LABEL),
            "--filter",
            &format!("label={}", PROJECT_LABEL),
        ],
    )
    .await;

    if result.exit_code != 0 {
        tracing::warn!("Could not list running containers for recovery");
        return;
    }

    let mut recovered = 0;

    for line in result.stdout.lines() {
        let mut parts = line.split_whitespace();
        let (Some(project), Some(build)) = (parts.next(), parts.next()) else {
            continue;
        };

        let (Ok(project_id), Ok(build_id)) = (project.parse::<Uuid>(), build.parse::<Uuid>())
        else {
            continue;
        };

        start_log_follower(state, project_id, build_id).await;
        recovered += 1;
    }

    tracing::info!(recovered, "Recovered container log followers");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_use_short_ids() {
        let project = Uuid::parse_str("a1b2c3d4-0000-0000-0000-000000000000").unwrap();
        let build = Uuid::parse_str("deadbeef-0000-0000-0000-000000000000").unwrap();

        assert_eq!(container_name(project), "slipway-a1b2c3d4");
        assert_eq!(image_name(project, build), "slipway-deploy/a1b2c3d4:deadbeef");
    }

    #[test]
    fn internal_ports_per_framework() {
        assert_eq!(internal_port(Framework::Vite), 80);
        assert_eq!(internal_port(Framework::NextJs), 3000);
        assert_eq!(internal_port(Framework::Express), 3000);
    }

    #[test]
    fn sanitize_rewrites_expose_and_port() {
        let input = "FROM node:20\nEXPOSE 9999\nENV PORT=9999\nCMD [\"npm\", \"start\"]";
        let output = sanitize_dockerfile(input, 3000);

        assert!(output.contains("EXPOSE 3000"));
        assert!(output.contains("ENV PORT=3000"));
        assert!(!output.contains("9999"));
    }

    #[test]
    fn sanitize_neutralizes_dangerous_lines() {
        let input = "FROM node:20\nUSER root\nRUN ls /var/run/docker.sock\nCMD [\"run\"]";
        let output = sanitize_dockerfile(input, 3000);

        assert!(output.contains("# REMOVED FOR SECURITY: USER root"));
        assert!(output.contains("# REMOVED FOR SECURITY: RUN ls /var/run/docker.sock"));
    }

    #[test]
    fn sanitize_injects_missing_port_env_before_cmd() {
        let input = "FROM node:20\nCMD [\"npm\", \"start\"]";
        let output = sanitize_dockerfile(input, 3000);

        let lines: Vec<&str> = output.lines().collect();
        let env_idx = lines.iter().position(|l| *l == "ENV PORT=3000").unwrap();
        let cmd_idx = lines.iter().position(|l| l.starts_with("CMD")).unwrap();

        assert!(env_idx < cmd_idx);
        assert!(output.contains("EXPOSE 3000"));
    }

    #[test]
    fn generated_vite_dockerfile_serves_dist() {
        let dockerfile = generate_dockerfile(Framework::Vite, 80, None);

        assert!(dockerfile.contains("FROM nginx:alpine"));
        assert!(dockerfile.contains("COPY dist/ /usr/share/nginx/html"));
        assert!(dockerfile.contains("EXPOSE 80"));
    }

    #[test]
    fn generated_backend_dockerfile_uses_entry() {
        let dockerfile = generate_dockerfile(Framework::Hono, 3000, Some("src/index.ts"));

        assert!(dockerfile.contains("FROM oven/bun:1-alpine AS builder"));
        assert!(dockerfile.contains(r#"CMD ["bun", "run", "src/index.ts"]"#));
        assert!(dockerfile.contains("ENV PORT=3000"));
        assert!(dockerfile.contains("EXPOSE 3000"));

        let fallback = generate_dockerfile(Framework::Express, 3000, None);
        assert!(fallback.contains(r#"CMD ["bun", "run", "start"]"#));
    }
}
