/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use slipway_core::logsink::{HttpLogSink, LogSink};
use slipway_core::types::EngineCli;
use entity::log_entry::LogLevel;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A static site served in-process on its project port.
#[derive(Debug)]
pub struct StaticServerHandle {
    pub port: i32,
    pub handle: JoinHandle<()>,
}

pub struct EngineState {
    pub cli: EngineCli,
    pub sink: HttpLogSink,
    pub http: reqwest::Client,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
    pub static_servers: Mutex<HashMap<Uuid, StaticServerHandle>>,
    pub log_followers: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl EngineState {
    pub fn new(cli: EngineCli) -> Self {
        let sink = HttpLogSink::new(cli.control_api_url.clone());

        Self {
            cli,
            sink,
            http: reqwest::Client::new(),
            locks: Mutex::new(HashMap::new()),
            static_servers: Mutex::new(HashMap::new()),
            log_followers: Mutex::new(HashMap::new()),
        }
    }

    /// Serializes activate/stop/delete per project. Operations on
    /// different projects run in parallel; the guard releases on every
    /// exit path by dropping.
    pub async fn lock_project(&self, project_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            Arc::clone(
                locks
                    .entry(project_id)
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };

        lock.lock_owned().await
    }

    /// Ships a deployment progress line into the build's log pipeline.
    /// Best effort; a down control plane never blocks a deployment.
    pub async fn stream_log(&self, build_id: Uuid, message: &str, level: LogLevel) {
        let line = format!("[Deploy] {}", message);

        if let Err(e) = self.sink.post_logs(build_id, &line, level).await {
            tracing::warn!(build = %build_id, error = %e, "Failed to stream deploy log");
        }
    }

    pub fn stop_static_server(&self, project_id: Uuid) {
        if let Some(server) = self.static_servers.lock().unwrap().remove(&project_id) {
            server.handle.abort();
            tracing::info!(project = %project_id, port = server.port, "Stopped static server");
        }
    }
}
