/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_stream::stream;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use axum_streams::StreamBodyAs;
use chrono::Utc;
use slipway_core::crypto::decrypt_value;
use slipway_core::database::{find_active_deployment, insert_log_entry, update_build_status};
use slipway_core::logs::LogMessage;
use slipway_core::queue::BuildJobData;
use slipway_core::types::*;
use entity::build::BuildStatus;
use entity::log_entry::LogLevel;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{WebError, WebResult};

#[derive(Serialize, Deserialize, Debug)]
pub struct BuildWithDeployment {
    #[serde(flatten)]
    pub build: MBuild,
    /// Whether this build is the project's currently active deployment.
    pub active: bool,
}

pub async fn get_builds(
    state: State<Arc<ServerState>>,
    Path(project_id): Path<Uuid>,
) -> WebResult<Json<Vec<BuildWithDeployment>>> {
    let project = EProject::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Project"))?;

    let builds = EBuild::find()
        .filter(CBuild::Project.eq(project.id))
        .order_by_desc(CBuild::CreatedAt)
        .all(&state.db)
        .await?;

    let active_build = find_active_deployment(&state.db, project.id)
        .await?
        .map(|d| d.build);

    let builds = builds
        .into_iter()
        .map(|build| BuildWithDeployment {
            active: Some(build.id) == active_build,
            build,
        })
        .collect();

    Ok(Json(builds))
}

pub async fn post_build(
    state: State<Arc<ServerState>>,
    Path(project_id): Path<Uuid>,
) -> WebResult<(StatusCode, Json<MBuild>)> {
    let project = EProject::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Project"))?;

    let build = create_build(&state, &project, None, None).await?;

    Ok((StatusCode::CREATED, Json(build)))
}

pub async fn get_build(
    state: State<Arc<ServerState>>,
    Path(build_id): Path<Uuid>,
) -> WebResult<Json<MBuild>> {
    let build = EBuild::find_by_id(build_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Build"))?;

    Ok(Json(build))
}

pub async fn get_build_logs(
    state: State<Arc<ServerState>>,
    Path(build_id): Path<Uuid>,
) -> WebResult<Json<Vec<MLogEntry>>> {
    let build = EBuild::find_by_id(build_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Build"))?;

    let entries = ELogEntry::find()
        .filter(CLogEntry::Build.eq(build.id))
        .order_by_asc(CLogEntry::Timestamp)
        .all(&state.db)
        .await?;

    Ok(Json(entries))
}

pub async fn delete_build_logs(
    state: State<Arc<ServerState>>,
    Path(build_id): Path<Uuid>,
) -> WebResult<Json<serde_json::Value>> {
    let build = EBuild::find_by_id(build_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Build"))?;

    let deleted = ELogEntry::delete_many()
        .filter(CLogEntry::Build.eq(build.id))
        .exec(&state.db)
        .await?;

    Ok(Json(serde_json::json!({ "deleted": deleted.rows_affected })))
}

/// Live tail of a build's log pipeline as newline-delimited JSON.
/// Only entries published after the subscription starts are delivered;
/// catch-up goes through the persisted list endpoint.
pub async fn get_build_log_stream(
    state: State<Arc<ServerState>>,
    Path(build_id): Path<Uuid>,
) -> Result<StreamBodyAs<'static>, WebError> {
    let build = EBuild::find_by_id(build_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Build"))?;

    let mut rx = state.hub.subscribe(build.id);

    let stream = stream! {
        loop {
            match rx.recv().await {
                Ok(message) => yield message,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    yield LogMessage {
                        build_id,
                        data: format!("[stream lagged, {} lines dropped]", skipped),
                        level: LogLevel::Warning,
                    };
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Ok(StreamBodyAs::json_nl(stream))
}

/// Creates a pending build for a project and hands it to the worker.
/// Shared by the REST endpoint and the webhook ingress.
pub async fn create_build(
    state: &Arc<ServerState>,
    project: &MProject,
    commit_sha: Option<String>,
    commit_message: Option<String>,
) -> WebResult<MBuild> {
    let build = ABuild {
        id: Set(Uuid::new_v4()),
        project: Set(project.id),
        status: Set(BuildStatus::Pending),
        commit_sha: Set(commit_sha),
        commit_message: Set(commit_message.map(|m| m.chars().take(255).collect())),
        artifact_id: Set(None),
        created_at: Set(Utc::now().naive_utc()),
        completed_at: Set(None),
    };

    let build = build.insert(&state.db).await?;

    let job = BuildJobData {
        build_id: build.id,
        project_id: project.id,
        repo_url: project.repo_url.clone(),
        build_command: project.build_command.clone(),
        root_directory: project.root_directory.clone(),
        framework: project.framework,
        env_vars: decrypted_env_vars(state, project.id).await?,
        installation_id: project.installation,
    };

    match state.queue.enqueue(&job).await {
        Ok(_) => {
            tracing::info!(build = %build.id, project = %project.id, "Enqueued build");
            Ok(build)
        }
        Err(queue_err) => {
            // Queue down: try the worker's HTTP surface before giving up.
            tracing::warn!(build = %build.id, error = %queue_err, "Queue unavailable, trying direct trigger");

            if state.worker.trigger_build(&job).await.is_ok() {
                return Ok(build);
            }

            let failed = update_build_status(&state.db, build, BuildStatus::Failed).await?;

            let message = format!("Failed to enqueue build: {}", queue_err);
            insert_log_entry(&state.db, failed.id, LogLevel::Error, message.clone()).await?;
            state.hub.publish(LogMessage {
                build_id: failed.id,
                data: message,
                level: LogLevel::Error,
            });

            Ok(failed)
        }
    }
}

/// The project's env vars, decrypted, for a build job snapshot.
pub async fn decrypted_env_vars(
    state: &Arc<ServerState>,
    project_id: Uuid,
) -> WebResult<HashMap<String, String>> {
    let rows = EEnvironmentVariable::find()
        .filter(CEnvironmentVariable::Project.eq(project_id))
        .all(&state.db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let value = decrypt_value(&state.encryption_key, &row.value);
            (row.key, value)
        })
        .collect())
}
