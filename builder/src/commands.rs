/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{bail, Context, Result};
use entity::log_entry::LogLevel;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::logstream::LogStreamer;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Rewrites package-manager invocations to bun, segment by segment.
/// Segments already using bun (or anything else) pass through, so the
/// rewrite is idempotent.
pub fn rewrite_build_command(command: &str) -> String {
    command
        .split("&&")
        .map(|segment| rewrite_segment(segment.trim()))
        .collect::<Vec<String>>()
        .join(" && ")
}

fn rewrite_segment(segment: &str) -> String {
    let tokens: Vec<&str> = segment.split_whitespace().collect();

    let (replacement, consumed) = match tokens.as_slice() {
        ["npm", "install", ..] | ["npm", "i", ..] | ["npm", "ci", ..] => ("bun install", 2),
        ["yarn", "install", ..] => ("bun install", 2),
        ["yarn"] => ("bun install", 1),
        ["pnpm", "install", ..] | ["pnpm", "i", ..] => ("bun install", 2),
        ["npm", "run", _script, ..] | ["pnpm", "run", _script, ..] => ("bun run", 2),
        ["yarn", script, ..] if !matches!(*script, "add" | "remove" | "install") => {
            ("bun run", 1)
        }
        _ => return tokens.join(" "),
    };

    let mut rewritten = vec![replacement];
    rewritten.extend(&tokens[consumed..]);
    rewritten.join(" ")
}

/// Whether a backend build command actually compiles something.
pub fn contains_build_tool(command: &str) -> bool {
    let tokens: Vec<&str> = command
        .split("&&")
        .flat_map(|segment| segment.split_whitespace())
        .collect();

    for window in tokens.windows(3) {
        if let [pm, "run", "build"] = window {
            if matches!(*pm, "npm" | "bun" | "yarn" | "pnpm") {
                return true;
            }
        }
    }

    for (i, token) in tokens.iter().enumerate() {
        match *token {
            "tsc" | "esbuild" | "swc" | "rollup" | "webpack" | "parcel" | "tsup" | "unbuild"
            | "ncc" => return true,
            "vite" | "next" => {
                if tokens.get(i + 1) == Some(&"build") {
                    return true;
                }
            }
            _ => {}
        }
    }

    false
}

/// Runs a `&&` chain one segment at a time under a single five-minute
/// wall clock shared by the whole chain. Output lines go to the log
/// pipeline as they appear, ANSI bytes and all.
pub async fn run_command(
    command: &str,
    cwd: &Path,
    env_vars: &HashMap<String, String>,
    streamer: &LogStreamer,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + COMMAND_TIMEOUT;

    for segment in command.split("&&") {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        run_segment(segment, cwd, env_vars, streamer, deadline).await?;
    }

    Ok(())
}

async fn run_segment(
    segment: &str,
    cwd: &Path,
    env_vars: &HashMap<String, String>,
    streamer: &LogStreamer,
    deadline: tokio::time::Instant,
) -> Result<()> {
    let mut tokens = segment.split_whitespace();
    let program = tokens.next().context("Empty command segment")?;

    streamer.info(format!("$ {}", segment)).await;

    let mut child = Command::new(program)
        .args(tokens)
        .current_dir(cwd)
        .envs(env_vars)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn `{}`", segment))?;

    let stdout = child.stdout.take().context("Failed to open stdout")?;
    let stderr = child.stderr.take().context("Failed to open stderr")?;

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();

    let status = tokio::time::timeout_at(deadline, async {
        loop {
            tokio::select! {
                line = stdout_lines.next_line() => {
                    match line {
                        Ok(Some(line)) => streamer.info(line).await,
                        _ => break,
                    }
                }
                line = stderr_lines.next_line() => {
                    if let Ok(Some(line)) = line {
                        streamer.info(line).await;
                    }
                }
            }
        }

        // Drain whatever stderr still holds after stdout closed.
        while let Ok(Some(line)) = stderr_lines.next_line().await {
            streamer.info(line).await;
        }

        child.wait().await
    })
    .await;

    match status {
        Ok(Ok(status)) if status.success() => Ok(()),
        Ok(Ok(status)) => {
            bail!("`{}` exited with {}", segment, status)
        }
        Ok(Err(e)) => Err(e).with_context(|| format!("Failed to wait for `{}`", segment)),
        Err(_) => {
            terminate(&mut child).await;
            streamer
                .push(LogLevel::Error, "Command timed out after 5 minutes")
                .await;
            bail!("Command timed out after 5 minutes")
        }
    }
}

/// SIGTERM first, SIGKILL shortly after for processes that ignore it.
async fn terminate(child: &mut tokio::process::Child) {
    if let Some(pid) = child.id() {
        let _ = Command::new("kill")
            .arg("-TERM")
            .arg(pid.to_string())
            .status()
            .await;

        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    let _ = child.start_kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_installs_to_bun() {
        assert_eq!(rewrite_build_command("npm install"), "bun install");
        assert_eq!(rewrite_build_command("npm i"), "bun install");
        assert_eq!(rewrite_build_command("npm ci"), "bun install");
        assert_eq!(rewrite_build_command("yarn install"), "bun install");
        assert_eq!(rewrite_build_command("yarn"), "bun install");
        assert_eq!(rewrite_build_command("pnpm install"), "bun install");
        assert_eq!(rewrite_build_command("pnpm i"), "bun install");
    }

    #[test]
    fn rewrites_run_scripts_to_bun() {
        assert_eq!(rewrite_build_command("npm run build"), "bun run build");
        assert_eq!(rewrite_build_command("pnpm run build"), "bun run build");
        assert_eq!(rewrite_build_command("yarn build"), "bun run build");
        assert_eq!(
            rewrite_build_command("npm run build -- --verbose"),
            "bun run build -- --verbose"
        );
    }

    #[test]
    fn yarn_package_commands_pass_through() {
        assert_eq!(rewrite_build_command("yarn add react"), "yarn add react");
        assert_eq!(rewrite_build_command("yarn remove react"), "yarn remove react");
    }

    #[test]
    fn other_segments_pass_through() {
        assert_eq!(rewrite_build_command("echo done"), "echo done");
        assert_eq!(rewrite_build_command("bun run build"), "bun run build");
        assert_eq!(rewrite_build_command("ls -la"), "ls -la");
    }

    #[test]
    fn rewrites_each_segment_of_a_chain() {
        assert_eq!(
            rewrite_build_command("npm install && npm run build"),
            "bun install && bun run build"
        );
        assert_eq!(
            rewrite_build_command("yarn && yarn build && echo ok"),
            "bun install && bun run build && echo ok"
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        for command in [
            "npm install && npm run build",
            "yarn && yarn build",
            "pnpm i && pnpm run lint && pnpm run build",
            "echo nothing",
            "bun install && bun run build",
        ] {
            let once = rewrite_build_command(command);
            let twice = rewrite_build_command(&once);
            assert_eq!(once, twice, "rewrite of {:?} is not idempotent", command);
        }
    }

    #[test]
    fn detects_build_tools() {
        assert!(contains_build_tool("tsc"));
        assert!(contains_build_tool("npx tsc --outDir dist"));
        assert!(contains_build_tool("esbuild src/index.ts"));
        assert!(contains_build_tool("vite build"));
        assert!(contains_build_tool("next build"));
        assert!(contains_build_tool("npm run build"));
        assert!(contains_build_tool("bun run build"));
        assert!(contains_build_tool("bun install && bun run build"));
        assert!(contains_build_tool("tsup src/index.ts"));
    }

    #[test]
    fn ignores_non_build_commands() {
        assert!(!contains_build_tool("bun run start"));
        assert!(!contains_build_tool("vite"));
        assert!(!contains_build_tool("next dev"));
        assert!(!contains_build_tool("echo build"));
        assert!(!contains_build_tool("npm run lint"));
    }
}
