/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod deploy;
pub mod docker;
pub mod entrypoint;
pub mod nginx;
pub mod process;
pub mod static_files;
pub mod types;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use slipway_core::deployer::{ActivateRequest, DeleteProjectRequest, StopRequest};
use serde::Deserialize;
use std::sync::Arc;
use types::EngineState;
use uuid::Uuid;

pub async fn serve_engine(state: Arc<EngineState>) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&state.cli.artifacts_dir).await?;
    tokio::fs::create_dir_all(&state.cli.apps_dir).await?;

    if state.cli.is_production() {
        let nginx_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = nginx::create_default_config(&nginx_state).await {
                tracing::warn!(error = %e, "Failed to install default nginx config");
            }
        });
    }

    if state.cli.use_docker {
        let recover_state = Arc::clone(&state);
        tokio::spawn(async move {
            docker::recover_log_followers(&recover_state).await;
        });
    }

    let server_url = format!("{}:{}", state.cli.ip, state.cli.port);

    tracing::info!(
        addr = %server_url,
        docker = state.cli.use_docker,
        "Deploy engine starting"
    );

    let app = Router::new()
        .route("/ports/check", post(post_port_check))
        .route(
            "/artifacts/upload",
            post(post_artifact_upload).layer(DefaultBodyLimit::max(1024 * 1024 * 1024)),
        )
        .route("/activate", post(post_activate))
        .route("/stop", post(post_stop))
        .route("/projects/:project/delete", post(post_delete_project))
        .route("/health", get(get_health))
        .route("/ready", get(get_ready))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&server_url).await?;
    axum::serve(listener, app).await
}

async fn get_health() -> &'static str {
    "ok"
}

async fn get_ready() -> &'static str {
    "ready"
}

#[derive(Deserialize)]
struct PortCheckRequest {
    port: i32,
}

async fn post_port_check(
    Json(body): Json<PortCheckRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    if body.port <= 0 {
        return Err((StatusCode::BAD_REQUEST, "Port required".to_string()));
    }

    let available = process::port_available(body.port).await;
    Ok(Json(serde_json::json!({ "available": available })))
}

#[derive(Deserialize)]
struct UploadQuery {
    #[serde(rename = "buildId")]
    build_id: Uuid,
}

async fn post_artifact_upload(
    state: State<Arc<EngineState>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let artifact_path = state
        .cli
        .artifacts_dir
        .join(format!("{}.tar.gz", query.build_id));

    tokio::fs::write(&artifact_path, &body).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to write artifact: {}", e),
        )
    })?;

    tracing::info!(
        build = %query.build_id,
        bytes = body.len(),
        "Artifact received"
    );

    Ok(Json(serde_json::json!({
        "message": "Artifact received",
        "artifactPath": artifact_path.to_string_lossy(),
    })))
}

async fn post_activate(
    state: State<Arc<EngineState>>,
    Json(req): Json<ActivateRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    deploy::activate(&state, req)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))?;

    Ok(Json(serde_json::json!({ "success": true })))
}

async fn post_stop(
    state: State<Arc<EngineState>>,
    Json(req): Json<StopRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    deploy::stop(&state, req)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))?;

    Ok(Json(serde_json::json!({ "success": true })))
}

async fn post_delete_project(
    state: State<Arc<EngineState>>,
    Path(project_id): Path<Uuid>,
    body: Option<Json<DeleteProjectRequest>>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let req = body.map(|Json(req)| req).unwrap_or(DeleteProjectRequest {
        port: None,
        subdomain: None,
        build_ids: Vec::new(),
    });

    deploy::delete_project(&state, project_id, req)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))?;

    Ok(Json(serde_json::json!({ "success": true })))
}
