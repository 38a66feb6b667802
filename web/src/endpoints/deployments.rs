/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::extract::{Path, State};
use axum::Json;
use slipway_core::database::{find_active_deployment, insert_log_entry, promote_deployment};
use slipway_core::deployer::{ActivateRequest, Deployer, StopRequest};
use slipway_core::input::subdomain_of;
use slipway_core::logs::LogMessage;
use slipway_core::types::*;
use entity::build::BuildStatus;
use entity::log_entry::LogLevel;
use sea_orm::EntityTrait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{WebError, WebResult};

use super::builds::decrypted_env_vars;

pub async fn get_active_deployment(
    state: State<Arc<ServerState>>,
    Path(project_id): Path<Uuid>,
) -> WebResult<Json<MDeployment>> {
    let project = EProject::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Project"))?;

    let deployment = find_active_deployment(&state.db, project.id)
        .await?
        .ok_or_else(|| WebError::not_found("Active deployment"))?;

    Ok(Json(deployment))
}

pub async fn post_stop(
    state: State<Arc<ServerState>>,
    Path(project_id): Path<Uuid>,
) -> WebResult<Json<serde_json::Value>> {
    let project = EProject::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Project"))?;

    let active = find_active_deployment(&state.db, project.id).await?;

    state
        .deployer
        .stop(&StopRequest {
            port: project.port,
            project_id: Some(project.id),
            build_id: active.as_ref().map(|d| d.build),
        })
        .await?;

    Ok(Json(serde_json::json!({ "stopped": true })))
}

/// Promotes a successful build onto its project's port. Serves both fresh
/// activations and rollbacks ("promote build N of project P").
pub async fn post_activate_build(
    state: State<Arc<ServerState>>,
    Path(build_id): Path<Uuid>,
) -> WebResult<Json<MDeployment>> {
    let deployment = activate_build(&state, build_id).await?;
    Ok(Json(deployment))
}

pub async fn activate_build(
    state: &Arc<ServerState>,
    build_id: Uuid,
) -> WebResult<MDeployment> {
    let build = EBuild::find_by_id(build_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Build"))?;

    if build.status != BuildStatus::Success {
        return Err(WebError::Validation(format!(
            "Only successful builds can be activated (build is {})",
            build.status
        )));
    }

    let project = EProject::find_by_id(build.project)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Project"))?;

    let request = ActivateRequest {
        project_id: project.id,
        build_id: build.id,
        port: project.port,
        app_type: project.framework,
        subdomain: project
            .domain
            .as_deref()
            .map(|d| subdomain_of(d, &state.cli.base_domain).to_string()),
        env_vars: decrypted_env_vars(state, project.id).await?,
    };

    state.deployer.activate(&request).await?;

    let deployment = promote_deployment(&state.db, project.id, build.id).await?;

    tracing::info!(
        build = %build.id,
        project = %project.id,
        port = project.port,
        "Deployment activated"
    );

    Ok(deployment)
}

/// Background path taken when a build reaches `success`. Failure is
/// recorded in the build's log stream; the build keeps its success status
/// either way.
pub async fn auto_activate(state: Arc<ServerState>, build_id: Uuid) {
    if let Err(e) = activate_build(&state, build_id).await {
        let message = format!("Auto-activation failed: {}", e);
        tracing::error!(build = %build_id, "{}", message);

        if let Err(db_err) =
            insert_log_entry(&state.db, build_id, LogLevel::Error, message.clone()).await
        {
            tracing::error!(build = %build_id, error = %db_err, "Failed to persist activation error");
        }

        state.hub.publish(LogMessage {
            build_id,
            data: message,
            level: LogLevel::Error,
        });
    }
}
