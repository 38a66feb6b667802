/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{bail, Context, Result};
use entity::log_entry::LogLevel;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::Command;
use uuid::Uuid;

use super::types::EngineState;

const PORT_FREE_TIMEOUT: Duration = Duration::from_secs(5);
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_millis(500);
const STARTUP_GRACE: Duration = Duration::from_secs(2);

/// A port is available when we can bind it ourselves.
pub async fn port_available(port: i32) -> bool {
    match u16::try_from(port) {
        Ok(port) => TcpListener::bind(("0.0.0.0", port)).await.is_ok(),
        Err(_) => false,
    }
}

/// SIGTERM the recorded process, escalate to SIGKILL after a short grace,
/// drop the pid file. Missing or stale pid files are not an error.
pub async fn kill_recorded_process(project_dir: &Path) {
    let pid_file = project_dir.join("server.pid");

    let Ok(raw) = tokio::fs::read_to_string(&pid_file).await else {
        return;
    };

    if let Ok(pid) = raw.trim().parse::<i64>() {
        let _ = Command::new("kill")
            .arg("-TERM")
            .arg(pid.to_string())
            .status()
            .await;

        tokio::time::sleep(Duration::from_millis(300)).await;

        let _ = Command::new("kill")
            .arg("-KILL")
            .arg(pid.to_string())
            .status()
            .await;
    }

    let _ = tokio::fs::remove_file(&pid_file).await;
}

/// Last-resort stop when no pid file is known: ask lsof who holds the
/// port and terminate them.
pub async fn kill_port_listeners(port: i32) {
    let output = Command::new("lsof")
        .args(["-t", "-i", &format!(":{}", port)])
        .output()
        .await;

    let Ok(output) = output else {
        return;
    };

    let pids: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if pids.is_empty() {
        return;
    }

    for pid in &pids {
        let _ = Command::new("kill").arg("-TERM").arg(pid).status().await;
    }

    tokio::time::sleep(Duration::from_millis(500)).await;

    for pid in &pids {
        let _ = Command::new("kill").arg("-KILL").arg(pid).status().await;
    }
}

/// Waits for the previous occupant of a port to let go. Free means a TCP
/// connect is refused.
pub async fn wait_for_port_free(port: i32) -> Result<()> {
    let deadline = tokio::time::Instant::now() + PORT_FREE_TIMEOUT;

    loop {
        match TcpStream::connect(("127.0.0.1", port as u16)).await {
            Err(_) => return Ok(()),
            Ok(_) => {
                if tokio::time::Instant::now() >= deadline {
                    bail!("Port {} still in use after {:?}", port, PORT_FREE_TIMEOUT);
                }
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
        }
    }
}

/// `bun install` in the extracted build unless node_modules already
/// exists (artifacts for frontends ship without it).
pub async fn ensure_dependencies(state: &Arc<EngineState>, cwd: &Path) -> Result<()> {
    if cwd.join("node_modules").is_dir() {
        return Ok(());
    }

    let output = Command::new(&state.cli.binpath_bun)
        .arg("install")
        .current_dir(cwd)
        .output()
        .await
        .context("Failed to run bun install")?;

    if !output.status.success() {
        bail!(
            "bun install failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}

/// Spawns the application detached on its port, records the pid, and
/// pipes process output into the build's log stream.
pub async fn start_application(
    state: &Arc<EngineState>,
    cwd: &Path,
    project_dir: &Path,
    build_id: Uuid,
    port: i32,
    command: &[String],
    env_vars: &std::collections::HashMap<String, String>,
) -> Result<()> {
    let (program, args) = command.split_first().context("Empty start command")?;

    state
        .stream_log(
            build_id,
            &format!("Running: {}", command.join(" ")),
            LogLevel::Info,
        )
        .await;

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .envs(env_vars)
        .env("NODE_ENV", "production")
        .env("PORT", port.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to start process: {}", command.join(" ")))?;

    let pid = child.id().context("Spawned process has no pid")?;

    tokio::fs::write(project_dir.join("server.pid"), pid.to_string())
        .await
        .context("Failed to write pid file")?;

    state
        .stream_log(
            build_id,
            &format!("Process started with PID {} on port {}", pid, port),
            LogLevel::Info,
        )
        .await;

    if let Some(stdout) = child.stdout.take() {
        spawn_output_forwarder(Arc::clone(state), build_id, stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_output_forwarder(Arc::clone(state), build_id, stderr);
    }

    // Reap the child in the background; its lifetime is tracked through
    // the pid file, not this handle.
    tokio::spawn(async move {
        let _ = child.wait().await;
    });

    tokio::time::sleep(STARTUP_GRACE).await;

    Ok(())
}

fn spawn_output_forwarder(
    state: Arc<EngineState>,
    build_id: Uuid,
    reader: impl tokio::io::AsyncRead + Unpin + Send + 'static,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            state.stream_log(build_id, &line, LogLevel::Info).await;
        }
    });
}

/// Polls `http://localhost:<port>/` until something answers with a status
/// below 500 or the window closes.
pub async fn health_check(state: &Arc<EngineState>, port: i32, timeout: Duration) -> Result<()> {
    let url = format!("http://localhost:{}/", port);
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let request = state
            .http
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await;

        if let Ok(res) = request {
            if res.status().as_u16() < 500 {
                return Ok(());
            }
        }

        if tokio::time::Instant::now() >= deadline {
            bail!("Health check timed out after {:?} on port {}", timeout, port);
        }

        tokio::time::sleep(HEALTH_CHECK_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bound_port_is_not_available() {
        let listener = TcpListener::bind(("0.0.0.0", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port() as i32;

        assert!(!port_available(port).await);
        drop(listener);
        assert!(port_available(port).await);
    }

    #[tokio::test]
    async fn invalid_ports_are_unavailable() {
        assert!(!port_available(-1).await);
        assert!(!port_available(70000).await);
    }

    #[tokio::test]
    async fn wait_for_port_free_returns_when_released() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port() as i32;

        // Accept loop keeps the port busy until dropped.
        let server = tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(400)).await;
            server.abort();
        });

        wait_for_port_free(port).await.unwrap();
    }
}
