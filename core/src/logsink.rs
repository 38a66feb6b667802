/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{bail, Result};
use async_trait::async_trait;
use entity::build::BuildStatus;
use entity::log_entry::LogLevel;
use std::time::Duration;
use uuid::Uuid;

/// Where build and deploy output goes: the control plane's internal
/// surface, which persists entries and fans them out to live subscribers.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn post_logs(&self, build_id: Uuid, logs: &str, level: LogLevel) -> Result<()>;
    async fn put_status(&self, build_id: Uuid, status: BuildStatus) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct HttpLogSink {
    base_url: String,
    http: reqwest::Client,
}

impl HttpLogSink {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { base_url, http }
    }
}

#[async_trait]
impl LogSink for HttpLogSink {
    async fn post_logs(&self, build_id: Uuid, logs: &str, level: LogLevel) -> Result<()> {
        let res = self
            .http
            .post(format!("{}/builds/{}/logs", self.base_url, build_id))
            .json(&serde_json::json!({ "logs": logs, "level": level }))
            .send()
            .await?;

        if !res.status().is_success() {
            bail!("log post returned {}", res.status());
        }

        Ok(())
    }

    async fn put_status(&self, build_id: Uuid, status: BuildStatus) -> Result<()> {
        let res = self
            .http
            .put(format!("{}/builds/{}", self.base_url, build_id))
            .json(&serde_json::json!({ "status": status.as_str() }))
            .send()
            .await?;

        if !res.status().is_success() {
            bail!("status update returned {}", res.status());
        }

        Ok(())
    }
}
