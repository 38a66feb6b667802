/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use slipway_core::github::{verify_webhook_signature, AppAuth};
use slipway_core::types::*;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{WebError, WebResult};

use super::builds::create_build;

#[derive(Deserialize)]
struct InstallationAccount {
    login: String,
    id: i64,
    #[serde(rename = "type")]
    account_type: String,
}

#[derive(Deserialize)]
struct InstallationRef {
    id: i64,
    account: Option<InstallationAccount>,
}

#[derive(Deserialize)]
struct RepositoryRef {
    id: i64,
}

#[derive(Deserialize)]
struct HeadCommit {
    message: String,
}

#[derive(Deserialize)]
struct InstallationEvent {
    action: String,
    installation: InstallationRef,
}

#[derive(Deserialize)]
struct PushEvent {
    #[serde(rename = "ref")]
    git_ref: String,
    after: String,
    head_commit: Option<HeadCommit>,
    installation: Option<InstallationRef>,
    repository: RepositoryRef,
}

#[derive(Serialize, Debug, Default)]
pub struct WebhookSummary {
    pub processed: bool,
    pub builds_triggered: u32,
    pub builds_skipped: u32,
}

pub async fn get_installations(
    state: State<Arc<ServerState>>,
) -> WebResult<Json<Vec<MGithubInstallation>>> {
    let installations = EGithubInstallation::find().all(&state.db).await?;
    Ok(Json(installations))
}

pub async fn get_installation_repositories(
    state: State<Arc<ServerState>>,
    Path(installation_id): Path<i64>,
) -> WebResult<Json<serde_json::Value>> {
    let auth = app_auth(&state)?;

    let repositories = auth
        .list_installation_repositories(&state.http, installation_id)
        .await
        .map_err(|e| WebError::Upstream(e.to_string()))?;

    Ok(Json(repositories))
}

/// Signed source-control events. The raw body is read before any parsing
/// so the signature covers exactly the bytes GitHub sent.
pub async fn post_webhook(
    state: State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> WebResult<Json<WebhookSummary>> {
    let secret = state
        .cli
        .github_webhook_secret
        .as_deref()
        .ok_or_else(|| WebError::Unauthorized("Webhook secret not configured".to_string()))?;

    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !verify_webhook_signature(secret, &body, signature) {
        return Err(WebError::Unauthorized("Invalid webhook signature".to_string()));
    }

    let event = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    // Past this point nothing throws back to GitHub: a verified delivery
    // always gets the summary, with failures folded into it and logged.
    let mut summary = WebhookSummary::default();

    match event.as_str() {
        "installation" => match serde_json::from_slice::<InstallationEvent>(&body) {
            Ok(payload) => match handle_installation_event(&state, payload).await {
                Ok(()) => summary.processed = true,
                Err(e) => {
                    tracing::error!(error = %e, "Installation event failed");
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Malformed installation payload");
            }
        },
        "push" => match serde_json::from_slice::<PushEvent>(&body) {
            Ok(payload) => {
                handle_push_event(&state, payload, &mut summary).await;
                summary.processed = true;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed push payload");
            }
        },
        _ => {
            tracing::debug!(event = %event, "Ignoring webhook event");
        }
    }

    Ok(Json(summary))
}

async fn handle_installation_event(
    state: &Arc<ServerState>,
    payload: InstallationEvent,
) -> WebResult<()> {
    let installation_id = payload.installation.id;

    match payload.action.as_str() {
        "created" => {
            let account = payload.installation.account.ok_or_else(|| {
                WebError::Validation("Installation event without account".to_string())
            })?;

            let existing = EGithubInstallation::find()
                .filter(CGithubInstallation::InstallationId.eq(installation_id))
                .one(&state.db)
                .await?;

            if let Some(existing) = existing {
                let mut row: AGithubInstallation = existing.into();
                row.account_login = Set(account.login);
                row.account_id = Set(account.id);
                row.account_type = Set(account.account_type);
                row.update(&state.db).await?;
            } else {
                let row = AGithubInstallation {
                    id: Set(Uuid::new_v4()),
                    installation_id: Set(installation_id),
                    account_login: Set(account.login),
                    account_id: Set(account.id),
                    account_type: Set(account.account_type),
                };
                row.insert(&state.db).await?;
            }

            tracing::info!(installation = installation_id, "Installation registered");
        }
        "deleted" => {
            EGithubInstallation::delete_many()
                .filter(CGithubInstallation::InstallationId.eq(installation_id))
                .exec(&state.db)
                .await?;

            EProject::update_many()
                .col_expr(CProject::Installation, sea_orm::sea_query::Expr::value(Option::<i64>::None))
                .filter(CProject::Installation.eq(installation_id))
                .exec(&state.db)
                .await?;

            tracing::info!(installation = installation_id, "Installation removed");
        }
        other => {
            tracing::debug!(action = %other, "Ignoring installation action");
        }
    }

    Ok(())
}

/// Triggers builds for every project following the pushed branch. Replays
/// of the same `(project, commit)` pair are skipped, so redelivered
/// webhooks create no extra builds.
async fn handle_push_event(
    state: &Arc<ServerState>,
    payload: PushEvent,
    summary: &mut WebhookSummary,
) {
    let branch = match payload.git_ref.strip_prefix("refs/heads/") {
        Some(branch) => branch.to_string(),
        None => {
            tracing::debug!(git_ref = %payload.git_ref, "Push is not a branch update");
            return;
        }
    };

    let commit_sha = payload.after;
    let commit_message = payload.head_commit.map(|c| c.message);
    let installation_id = payload.installation.map(|i| i.id);

    let projects = match EProject::find()
        .filter(
            Condition::all()
                .add(CProject::RepoId.eq(payload.repository.id))
                .add(CProject::DefaultBranch.eq(branch.clone())),
        )
        .all(&state.db)
        .await
    {
        Ok(projects) => projects,
        Err(e) => {
            tracing::error!(error = %e, "Failed to resolve projects for push");
            return;
        }
    };

    for project in projects {
        if !project.auto_deploy {
            summary.builds_skipped += 1;
            continue;
        }

        let duplicate = EBuild::find()
            .filter(
                Condition::all()
                    .add(CBuild::Project.eq(project.id))
                    .add(CBuild::CommitSha.eq(commit_sha.clone())),
            )
            .one(&state.db)
            .await;

        match duplicate {
            Ok(Some(_)) => {
                summary.builds_skipped += 1;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(project = %project.id, error = %e, "Duplicate check failed");
                summary.builds_skipped += 1;
                continue;
            }
        }

        // Keep the project's installation fresh; pushes carry it and
        // manual project setup may not have.
        let mut project = project;
        if installation_id.is_some() && project.installation != installation_id {
            let mut aproject: AProject = project.clone().into();
            aproject.installation = Set(installation_id);
            match aproject.update(&state.db).await {
                Ok(updated) => project = updated,
                Err(e) => {
                    tracing::warn!(project = %project.id, error = %e, "Failed to update installation");
                }
            }
        }

        match create_build(
            state,
            &project,
            Some(commit_sha.clone()),
            commit_message.clone(),
        )
        .await
        {
            Ok(build) => {
                tracing::info!(build = %build.id, project = %project.id, "Webhook triggered build");
                summary.builds_triggered += 1;
            }
            Err(e) => {
                tracing::error!(project = %project.id, error = %e, "Webhook build creation failed");
                summary.builds_skipped += 1;
            }
        }
    }
}

fn app_auth(state: &ServerState) -> Result<AppAuth, WebError> {
    let app_id = state
        .cli
        .github_app_id
        .as_deref()
        .ok_or_else(|| WebError::Validation("GitHub App not configured".to_string()))?;
    let key_path = state
        .cli
        .github_app_private_key_path
        .as_deref()
        .ok_or_else(|| WebError::Validation("GitHub App not configured".to_string()))?;

    AppAuth::load(app_id, key_path).map_err(|e| WebError::InternalServerError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_payload_extraction() {
        let payload: PushEvent = serde_json::from_str(
            r#"{
                "ref": "refs/heads/main",
                "after": "c1c1c1c1",
                "head_commit": {"message": "fix: handle empty input"},
                "installation": {"id": 77},
                "repository": {"id": 42}
            }"#,
        )
        .unwrap();

        assert_eq!(payload.git_ref.strip_prefix("refs/heads/"), Some("main"));
        assert_eq!(payload.after, "c1c1c1c1");
        assert_eq!(payload.head_commit.unwrap().message, "fix: handle empty input");
        assert_eq!(payload.installation.unwrap().id, 77);
        assert_eq!(payload.repository.id, 42);
    }

    #[test]
    fn push_payload_tolerates_missing_optionals() {
        let payload: PushEvent = serde_json::from_str(
            r#"{
                "ref": "refs/tags/v1.0.0",
                "after": "abc",
                "repository": {"id": 42}
            }"#,
        )
        .unwrap();

        assert!(payload.head_commit.is_none());
        assert!(payload.installation.is_none());
        assert!(payload.git_ref.strip_prefix("refs/heads/").is_none());
    }

    #[test]
    fn installation_payload_extraction() {
        let payload: InstallationEvent = serde_json::from_str(
            r#"{
                "action": "created",
                "installation": {
                    "id": 77,
                    "account": {"login": "acme", "id": 9, "type": "Organization"}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(payload.action, "created");
        assert_eq!(payload.installation.id, 77);

        let account = payload.installation.account.unwrap();
        assert_eq!(account.login, "acme");
        assert_eq!(account.account_type, "Organization");
    }

    #[test]
    fn summary_defaults_to_nothing_processed() {
        let summary = WebhookSummary::default();

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["processed"], false);
        assert_eq!(value["builds_triggered"], 0);
        assert_eq!(value["builds_skipped"], 0);
    }
}
