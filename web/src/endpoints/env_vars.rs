/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use slipway_core::crypto::{decrypt_value, encrypt_value};
use slipway_core::types::*;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{WebError, WebResult};

#[derive(Serialize, Deserialize, Debug)]
pub struct EnvVarRequest {
    pub key: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct EnvVarResponse {
    pub key: String,
    pub value: String,
}

pub async fn get_env_vars(
    state: State<Arc<ServerState>>,
    Path(project_id): Path<Uuid>,
) -> WebResult<Json<Vec<EnvVarResponse>>> {
    let project = EProject::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Project"))?;

    let rows = EEnvironmentVariable::find()
        .filter(CEnvironmentVariable::Project.eq(project.id))
        .order_by_asc(CEnvironmentVariable::Key)
        .all(&state.db)
        .await?;

    let vars = rows
        .into_iter()
        .map(|row| EnvVarResponse {
            value: decrypt_value(&state.encryption_key, &row.value),
            key: row.key,
        })
        .collect();

    Ok(Json(vars))
}

pub async fn post_env_var(
    state: State<Arc<ServerState>>,
    Path(project_id): Path<Uuid>,
    Json(body): Json<EnvVarRequest>,
) -> WebResult<(StatusCode, Json<EnvVarResponse>)> {
    if body.key.trim().is_empty() {
        return Err(WebError::Validation("Key cannot be empty".to_string()));
    }

    let project = EProject::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Project"))?;

    let ciphertext = encrypt_value(&state.encryption_key, &body.value)
        .map_err(|e| WebError::InternalServerError(e.to_string()))?;

    let now = Utc::now().naive_utc();

    let existing = EEnvironmentVariable::find()
        .filter(
            Condition::all()
                .add(CEnvironmentVariable::Project.eq(project.id))
                .add(CEnvironmentVariable::Key.eq(body.key.clone())),
        )
        .one(&state.db)
        .await?;

    let status = if let Some(existing) = existing {
        let mut avar: AEnvironmentVariable = existing.into();
        avar.value = Set(ciphertext);
        avar.updated_at = Set(now);
        avar.update(&state.db).await?;
        StatusCode::OK
    } else {
        let avar = AEnvironmentVariable {
            id: Set(Uuid::new_v4()),
            project: Set(project.id),
            key: Set(body.key.clone()),
            value: Set(ciphertext),
            created_at: Set(now),
            updated_at: Set(now),
        };
        avar.insert(&state.db).await?;
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(EnvVarResponse {
            key: body.key,
            value: body.value,
        }),
    ))
}

pub async fn delete_env_var(
    state: State<Arc<ServerState>>,
    Path((project_id, key)): Path<(Uuid, String)>,
) -> WebResult<Json<serde_json::Value>> {
    let project = EProject::find_by_id(project_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Project"))?;

    let existing = EEnvironmentVariable::find()
        .filter(
            Condition::all()
                .add(CEnvironmentVariable::Project.eq(project.id))
                .add(CEnvironmentVariable::Key.eq(key)),
        )
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Environment variable"))?;

    let avar: AEnvironmentVariable = existing.into();
    avar.delete(&state.db).await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
