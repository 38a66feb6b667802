/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use entity::project::Framework;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use super::consts::{QUEUE_COMPLETED_RETENTION, QUEUE_FAILED_RETENTION};

const QUEUE_KEY: &str = "slipway:builds:queue";
const PENDING_KEY: &str = "slipway:builds:pending";
const COMPLETED_KEY: &str = "slipway:builds:completed";
const FAILED_KEY: &str = "slipway:builds:failed";

/// The one payload shape the worker accepts. Unknown fields are rejected
/// so the queue cannot smuggle anything past the boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BuildJobData {
    pub build_id: Uuid,
    pub project_id: Uuid,
    pub repo_url: String,
    pub build_command: String,
    pub root_directory: String,
    pub framework: Framework,
    pub env_vars: HashMap<String, String>,
    pub installation_id: Option<i64>,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Job serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable build job queue. Single producer (control plane), N consumers
/// (workers); the job id is the build id, making enqueues idempotent.
#[derive(Debug, Clone)]
pub struct BuildQueue {
    client: redis::Client,
}

impl BuildQueue {
    pub fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, QueueError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Enqueues a job keyed by its build id. Returns false when a job with
    /// the same id is already pending.
    pub async fn enqueue(&self, job: &BuildJobData) -> Result<bool, QueueError> {
        let mut conn = self.conn().await?;

        let added: i64 = conn.sadd(PENDING_KEY, job.build_id.to_string()).await?;
        if added == 0 {
            return Ok(false);
        }

        let payload = serde_json::to_string(job)?;
        let _: () = conn.lpush(QUEUE_KEY, payload).await?;

        Ok(true)
    }

    /// Blocking pop with a timeout. `None` means the queue stayed empty.
    pub async fn dequeue(&self, timeout_secs: f64) -> Result<Option<BuildJobData>, QueueError> {
        let mut conn = self.conn().await?;

        let popped: Option<(String, String)> = conn.brpop(QUEUE_KEY, timeout_secs).await?;

        match popped {
            Some((_, payload)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub async fn mark_completed(&self, build_id: Uuid) -> Result<(), QueueError> {
        self.finish(build_id, COMPLETED_KEY, QUEUE_COMPLETED_RETENTION)
            .await
    }

    pub async fn mark_failed(&self, build_id: Uuid) -> Result<(), QueueError> {
        self.finish(build_id, FAILED_KEY, QUEUE_FAILED_RETENTION).await
    }

    async fn finish(&self, build_id: Uuid, list: &str, retention: isize) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let id = build_id.to_string();

        let _: () = conn.srem(PENDING_KEY, &id).await?;
        let _: () = conn.lpush(list, &id).await?;
        let _: () = conn.ltrim(list, 0, retention - 1).await?;

        Ok(())
    }

    /// Drops every queued job. Jobs already claimed by a worker are not
    /// affected.
    pub async fn drain(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn().await?;

        let drained: u64 = conn.llen(QUEUE_KEY).await?;
        let _: () = conn.del(QUEUE_KEY).await?;
        let _: () = conn.del(PENDING_KEY).await?;

        Ok(drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_json() -> String {
        format!(
            r#"{{
                "build_id": "{}",
                "project_id": "{}",
                "repo_url": "https://github.com/acme/hello",
                "build_command": "npm run build",
                "root_directory": "./",
                "framework": "vite",
                "env_vars": {{"API_URL": "https://api.example.com"}},
                "installation_id": null
            }}"#,
            Uuid::nil(),
            Uuid::nil()
        )
    }

    #[test]
    fn job_data_round_trips() {
        let job: BuildJobData = serde_json::from_str(&job_json()).unwrap();
        assert_eq!(job.framework, Framework::Vite);
        assert_eq!(job.env_vars["API_URL"], "https://api.example.com");

        let encoded = serde_json::to_string(&job).unwrap();
        let decoded: BuildJobData = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn job_data_rejects_unknown_fields() {
        let mut payload: serde_json::Value = serde_json::from_str(&job_json()).unwrap();
        payload["shell"] = serde_json::json!("/bin/sh");

        let result: Result<BuildJobData, _> = serde_json::from_value(payload);
        assert!(result.is_err());
    }

    #[test]
    fn job_data_rejects_missing_fields() {
        let result: Result<BuildJobData, _> = serde_json::from_str(r#"{"build_id": null}"#);
        assert!(result.is_err());
    }
}
