/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Per-subdomain reverse proxy configuration.
//!
//! Config files are written atomically (temp file + rename) so nginx
//! never reads a half-written file, validated with `nginx -t` before a
//! reload, and removed only on project deletion.

use anyhow::{bail, Context, Result};
use slipway_core::input::check_subdomain;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;

use super::types::EngineState;

const RELOAD_ATTEMPTS: u32 = 3;

pub fn generate_config(subdomain: &str, base_domain: &str, port: i32) -> String {
    format!(
        r#"server {{
    listen 80;
    server_name {sub}.{base};

    return 301 https://$host$request_uri;
}}

server {{
    listen 443 ssl;
    server_name {sub}.{base};

    ssl_certificate     /etc/letsencrypt/live/{base}/fullchain.pem;
    ssl_certificate_key /etc/letsencrypt/live/{base}/privkey.pem;

    ssl_protocols TLSv1.2 TLSv1.3;
    ssl_ciphers HIGH:!aNULL:!MD5;

    location / {{
        proxy_pass http://localhost:{port};
        proxy_http_version 1.1;

        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection "upgrade";
        proxy_set_header Host $host;

        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;

        proxy_read_timeout 300;
        proxy_connect_timeout 300;
        proxy_send_timeout 300;
    }}
}}
"#,
        sub = subdomain,
        base = base_domain,
        port = port
    )
}

/// Catch-all for subdomains with no project behind them.
pub fn generate_default_config(base_domain: &str) -> String {
    format!(
        r#"server {{
    listen 80;
    server_name _ *.{base};
    add_header Content-Type text/plain;
    return 404 "Unknown subdomain. No project deployed.\n";
}}

server {{
    listen 443 ssl;
    server_name _ *.{base};

    ssl_certificate     /etc/letsencrypt/live/{base}/fullchain.pem;
    ssl_certificate_key /etc/letsencrypt/live/{base}/privkey.pem;

    add_header Content-Type text/plain;
    return 404 "Unknown subdomain. No project deployed.\n";
}}
"#,
        base = base_domain
    )
}

pub async fn create_config(state: &Arc<EngineState>, subdomain: &str, port: i32) -> Result<()> {
    check_subdomain(subdomain)
        .map_err(|e| anyhow::anyhow!("Invalid or reserved subdomain {}: {}", subdomain, e))?;

    let content = generate_config(subdomain, &state.cli.base_domain, port);
    let available = config_path(&state.cli.nginx_sites_dir, subdomain);

    write_atomic(&available, &content).await?;

    let enabled = config_path(&state.cli.nginx_enabled_dir, subdomain);
    if enabled != available && !enabled.exists() {
        tokio::fs::symlink(&available, &enabled)
            .await
            .context("Failed to enable nginx config")?;
    }

    reload().await
}

pub async fn remove_config(state: &Arc<EngineState>, subdomain: &str) -> Result<()> {
    let available = config_path(&state.cli.nginx_sites_dir, subdomain);
    let enabled = config_path(&state.cli.nginx_enabled_dir, subdomain);

    let _ = tokio::fs::remove_file(&enabled).await;
    let _ = tokio::fs::remove_file(&available).await;

    reload().await
}

pub async fn create_default_config(state: &Arc<EngineState>) -> Result<()> {
    let content = generate_default_config(&state.cli.base_domain);
    let path = state.cli.nginx_sites_dir.join("00-default.conf");

    write_atomic(&path, &content).await?;

    reload().await
}

/// `nginx -t` gate, then reload, with a handful of retries. nginx keeps
/// the last good config when validation fails, so retry is safe.
async fn reload() -> Result<()> {
    let mut last_error = None;

    for _ in 0..RELOAD_ATTEMPTS {
        match try_reload().await {
            Ok(()) => return Ok(()),
            Err(e) => last_error = Some(e),
        }

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("nginx reload failed")))
}

async fn try_reload() -> Result<()> {
    let test = Command::new("sudo")
        .args(["nginx", "-t"])
        .output()
        .await
        .context("Failed to run nginx -t")?;

    if !test.status.success() {
        bail!(
            "nginx config validation failed: {}",
            String::from_utf8_lossy(&test.stderr).trim()
        );
    }

    let reload = Command::new("sudo")
        .args(["systemctl", "reload", "nginx"])
        .output()
        .await
        .context("Failed to reload nginx")?;

    if !reload.status.success() {
        bail!(
            "nginx reload failed: {}",
            String::from_utf8_lossy(&reload.stderr).trim()
        );
    }

    Ok(())
}

fn config_path(dir: &PathBuf, subdomain: &str) -> PathBuf {
    dir.join(format!("{}.conf", subdomain))
}

async fn write_atomic(path: &PathBuf, content: &str) -> Result<()> {
    let tmp = path.with_extension("conf.tmp");

    tokio::fs::write(&tmp, content)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;

    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move config into place at {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_proxies_to_project_port() {
        let config = generate_config("hello", "apps.example.com", 8001);

        assert!(config.contains("server_name hello.apps.example.com;"));
        assert!(config.contains("proxy_pass http://localhost:8001;"));
        assert!(config.contains("return 301 https://$host$request_uri;"));
        assert!(config.contains("ssl_protocols TLSv1.2 TLSv1.3;"));
        assert!(config.contains("ssl_ciphers HIGH:!aNULL:!MD5;"));
        assert!(config.contains("proxy_set_header Upgrade $http_upgrade;"));
        assert!(config.contains("proxy_read_timeout 300;"));
    }

    #[test]
    fn default_config_rejects_unknown_subdomains() {
        let config = generate_default_config("apps.example.com");

        assert!(config.contains("server_name _ *.apps.example.com;"));
        assert!(config.contains("return 404"));
        assert!(config.contains("listen 80;"));
        assert!(config.contains("listen 443 ssl;"));
    }
}
