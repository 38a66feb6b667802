/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDateTime, Utc};
use slipway_core::consts::BASE_APP_PORT;
use slipway_core::crypto::encrypt_value;
use slipway_core::database::delete_project_cascade;
use slipway_core::deployer::{DeleteProjectRequest, Deployer};
use slipway_core::input::{check_build_command, check_subdomain, slugify, subdomain_of};
use slipway_core::types::*;
use entity::project::Framework;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{WebError, WebResult};

#[derive(Serialize, Deserialize, Debug)]
pub struct MakeProjectRequest {
    pub name: String,
    pub github_url: String,
    pub build_command: String,
    pub app_type: String,
    pub root_directory: Option<String>,
    pub domain: Option<String>,
    pub env_vars: Option<HashMap<String, String>>,
    pub github_repo_id: Option<i64>,
    pub github_repo_full_name: Option<String>,
    pub github_branch: Option<String>,
    pub github_installation_id: Option<i64>,
    pub auto_deploy: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PatchProjectRequest {
    pub name: Option<String>,
    pub build_command: Option<String>,
    pub app_type: Option<String>,
    pub root_directory: Option<String>,
    pub domain: Option<String>,
    pub default_branch: Option<String>,
    pub auto_deploy: Option<bool>,
}

/// Listing shape: everything but the host-local port.
#[derive(Serialize, Deserialize, Debug)]
pub struct ProjectSummary {
    pub id: Uuid,
    pub name: String,
    pub repo_url: String,
    pub default_branch: String,
    pub framework: Framework,
    pub domain: Option<String>,
    pub auto_deploy: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<MProject> for ProjectSummary {
    fn from(p: MProject) -> Self {
        ProjectSummary {
            id: p.id,
            name: p.name,
            repo_url: p.repo_url,
            default_branch: p.default_branch,
            framework: p.framework,
            domain: p.domain,
            auto_deploy: p.auto_deploy,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

pub async fn get_projects(
    state: State<Arc<ServerState>>,
) -> WebResult<Json<Vec<ProjectSummary>>> {
    let projects = EProject::find()
        .order_by_desc(CProject::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(projects.into_iter().map(Into::into).collect()))
}

pub async fn get_project(
    state: State<Arc<ServerState>>,
    Path(project_id): Path<Uuid>,
) -> WebResult<Json<MProject>> {
    let project = EProject::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Project"))?;

    Ok(Json(project))
}

pub async fn post_project(
    state: State<Arc<ServerState>>,
    Json(body): Json<MakeProjectRequest>,
) -> WebResult<(StatusCode, Json<MProject>)> {
    if body.name.trim().is_empty() {
        return Err(WebError::Validation("Project name cannot be empty".to_string()));
    }

    let framework = Framework::from_str(&body.app_type)
        .map_err(WebError::Validation)?;

    check_build_command(&body.build_command)
        .map_err(|e| WebError::Validation(e.to_string()))?;

    let domain = resolve_domain(&state, body.domain.as_deref(), &body.name)?;

    if let Some(fqdn) = &domain {
        let taken = EProject::find()
            .filter(CProject::Domain.eq(fqdn.clone()))
            .one(&state.db)
            .await?;

        if taken.is_some() {
            return Err(WebError::Conflict("Domain already in use".to_string()));
        }
    }

    let port = allocate_port(&state).await?;
    let now = Utc::now().naive_utc();

    let project = AProject {
        id: Set(Uuid::new_v4()),
        name: Set(body.name.clone()),
        repo_url: Set(body.github_url.clone()),
        repo_id: Set(body.github_repo_id),
        default_branch: Set(body.github_branch.unwrap_or_else(|| "main".to_string())),
        root_directory: Set(body.root_directory.unwrap_or_else(|| "./".to_string())),
        build_command: Set(body.build_command.clone()),
        framework: Set(framework),
        domain: Set(domain),
        port: Set(port),
        installation: Set(body.github_installation_id),
        auto_deploy: Set(body.auto_deploy.unwrap_or(true)),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let project = project.insert(&state.db).await?;

    if let Some(env_vars) = body.env_vars {
        for (key, value) in env_vars {
            let ciphertext = encrypt_value(&state.encryption_key, &value)
                .map_err(|e| WebError::InternalServerError(e.to_string()))?;

            let env_var = AEnvironmentVariable {
                id: Set(Uuid::new_v4()),
                project: Set(project.id),
                key: Set(key),
                value: Set(ciphertext),
                created_at: Set(now),
                updated_at: Set(now),
            };
            env_var.insert(&state.db).await?;
        }
    }

    tracing::info!(project = %project.id, port = project.port, "Created project");

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn put_project(
    state: State<Arc<ServerState>>,
    Path(project_id): Path<Uuid>,
    Json(body): Json<PatchProjectRequest>,
) -> WebResult<Json<MProject>> {
    let project = EProject::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Project"))?;

    let mut aproject: AProject = project.into();

    if let Some(name) = body.name {
        if name.trim().is_empty() {
            return Err(WebError::Validation("Project name cannot be empty".to_string()));
        }
        aproject.name = Set(name);
    }

    if let Some(build_command) = body.build_command {
        check_build_command(&build_command)
            .map_err(|e| WebError::Validation(e.to_string()))?;
        aproject.build_command = Set(build_command);
    }

    if let Some(app_type) = body.app_type {
        let framework = Framework::from_str(&app_type).map_err(WebError::Validation)?;
        aproject.framework = Set(framework);
    }

    if let Some(root_directory) = body.root_directory {
        aproject.root_directory = Set(root_directory);
    }

    if let Some(domain) = body.domain {
        let fqdn = resolve_domain(&state, Some(&domain), "")?;
        aproject.domain = Set(fqdn);
    }

    if let Some(default_branch) = body.default_branch {
        aproject.default_branch = Set(default_branch);
    }

    if let Some(auto_deploy) = body.auto_deploy {
        aproject.auto_deploy = Set(auto_deploy);
    }

    aproject.updated_at = Set(Utc::now().naive_utc());

    let project = aproject.update(&state.db).await?;

    Ok(Json(project))
}

pub async fn delete_project(
    state: State<Arc<ServerState>>,
    Path(project_id): Path<Uuid>,
) -> WebResult<Json<serde_json::Value>> {
    let project = EProject::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Project"))?;

    let builds = EBuild::find()
        .filter(CBuild::Project.eq(project.id))
        .all(&state.db)
        .await?;
    let build_ids: Vec<Uuid> = builds.iter().map(|b| b.id).collect();

    // Engine-side cleanup first, best effort. Row removal proceeds even if
    // the engine is down; the artifacts become orphans on its disk.
    let delete_req = DeleteProjectRequest {
        port: Some(project.port),
        subdomain: project
            .domain
            .as_deref()
            .map(|d| subdomain_of(d, &state.cli.base_domain).to_string()),
        build_ids: build_ids.clone(),
    };

    if let Err(e) = state.deployer.delete_project(project.id, &delete_req).await {
        tracing::warn!(project = %project.id, error = %e, "Engine cleanup failed during delete");
    }

    delete_project_cascade(&state.db, project.id, build_ids).await?;

    if EProject::find_by_id(project_id).one(&state.db).await?.is_some() {
        return Err(WebError::InternalServerError(
            "Project deletion did not complete".to_string(),
        ));
    }

    tracing::info!(project = %project_id, "Deleted project");

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Normalizes a requested domain (bare subdomain or FQDN) to a validated
/// FQDN under the base domain, or auto-derives one from the project name in
/// production when none was requested.
fn resolve_domain(
    state: &ServerState,
    requested: Option<&str>,
    project_name: &str,
) -> Result<Option<String>, WebError> {
    let base = &state.cli.base_domain;

    if let Some(domain) = requested {
        if domain.is_empty() {
            return Ok(None);
        }

        let subdomain = subdomain_of(domain, base);
        check_subdomain(subdomain).map_err(|e| WebError::Validation(e.to_string()))?;

        return Ok(Some(format!("{}.{}", subdomain, base)));
    }

    if state.cli.is_production() {
        let slug = slugify(project_name);
        if check_subdomain(&slug).is_ok() {
            return Ok(Some(format!("{}.{}", slug, base)));
        }
    }

    Ok(None)
}

/// Smallest port above every assigned one that the engine reports free.
/// The engine being unreachable fails project creation; guessing a port
/// that might collide with a running process is worse than a 502.
async fn allocate_port(state: &ServerState) -> Result<i32, WebError> {
    let max_assigned = slipway_core::database::get_max_assigned_port(&state.db)
        .await?
        .unwrap_or(BASE_APP_PORT)
        .max(BASE_APP_PORT);

    let mut candidate = max_assigned + 1;

    for _ in 0..state.cli.port_allocation_attempts {
        match state.deployer.check_port(candidate).await {
            Ok(true) => return Ok(candidate),
            Ok(false) => candidate += 1,
            Err(e) => return Err(e.into()),
        }
    }

    Err(WebError::InternalServerError(
        "No free port found for project".to_string(),
    ))
}
