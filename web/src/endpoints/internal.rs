/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Endpoints for the build worker and deploy engine. These are served on
//! the same router but are expected to be reachable only from the
//! segmented internal network.

use axum::extract::{Path, State};
use axum::Json;
use slipway_core::database::{insert_log_entry, update_build_status};
use slipway_core::logs::LogMessage;
use slipway_core::types::*;
use entity::build::BuildStatus;
use entity::log_entry::LogLevel;
use sea_orm::EntityTrait;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{WebError, WebResult};

use super::deployments::auto_activate;

#[derive(Deserialize)]
pub struct PostLogsRequest {
    pub logs: String,
    pub level: LogLevel,
}

#[derive(Deserialize)]
pub struct PutBuildRequest {
    pub status: String,
}

pub async fn get_health() -> &'static str {
    "ok"
}

/// Persist a chunk of build output and fan it out to live subscribers.
/// One LogEntry per line so ordered retrieval stays line-granular.
pub async fn post_build_logs(
    state: State<Arc<ServerState>>,
    Path(build_id): Path<Uuid>,
    Json(body): Json<PostLogsRequest>,
) -> WebResult<Json<serde_json::Value>> {
    let build = EBuild::find_by_id(build_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Build"))?;

    let mut persisted = 0u32;

    for line in body.logs.lines() {
        if line.is_empty() {
            continue;
        }

        insert_log_entry(&state.db, build.id, body.level, line.to_string()).await?;
        persisted += 1;

        state.hub.publish(LogMessage {
            build_id: build.id,
            data: line.to_string(),
            level: body.level,
        });
    }

    Ok(Json(serde_json::json!({ "persisted": persisted })))
}

/// Status updates from the worker. Terminal states stick; reaching
/// `success` kicks off activation in the background without holding the
/// worker's request open.
pub async fn put_build_status(
    state: State<Arc<ServerState>>,
    Path(build_id): Path<Uuid>,
    Json(body): Json<PutBuildRequest>,
) -> WebResult<Json<MBuild>> {
    let status = BuildStatus::from_str(&body.status).map_err(WebError::Validation)?;

    let build = EBuild::find_by_id(build_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Build"))?;

    let was_success = build.status == BuildStatus::Success;
    let build = update_build_status(&state.db, build, status).await?;

    if let Err(e) = match status {
        BuildStatus::Success => state.queue.mark_completed(build.id).await,
        BuildStatus::Failed => state.queue.mark_failed(build.id).await,
        _ => Ok(()),
    } {
        tracing::warn!(build = %build.id, error = %e, "Queue bookkeeping failed");
    }

    if build.status == BuildStatus::Success && !was_success {
        let state = Arc::clone(&state);
        let build_id = build.id;
        tokio::spawn(async move {
            auto_activate(state, build_id).await;
        });
    }

    Ok(Json(build))
}

pub async fn delete_queue(
    state: State<Arc<ServerState>>,
) -> WebResult<Json<serde_json::Value>> {
    let drained = state.queue.drain().await?;

    tracing::info!(drained, "Drained build queue");

    Ok(Json(serde_json::json!({ "drained": drained })))
}
