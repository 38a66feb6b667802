/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Unit tests for the web layer's pure pieces.

use crate::endpoints::projects::ProjectSummary;
use crate::error::WebError;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use slipway_core::types::MProject;
use entity::project::Framework;
use uuid::Uuid;

async fn envelope(error: WebError) -> (StatusCode, serde_json::Value) {
    let response = error.into_response();
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap();

    (status, body)
}

#[tokio::test]
async fn validation_errors_are_bad_requests() {
    let (status, body) = envelope(WebError::Validation("Unknown framework: rails".into())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation Error");
    assert_eq!(body["message"], "Unknown framework: rails");
}

#[tokio::test]
async fn not_found_envelope() {
    let (status, body) = envelope(WebError::not_found("Project")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["message"], "Project not found");
}

#[tokio::test]
async fn unauthorized_envelope() {
    let (status, body) = envelope(WebError::Unauthorized("Invalid webhook signature".into())).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn upstream_failures_are_bad_gateways() {
    let (status, body) = envelope(WebError::Upstream("Deploy engine unreachable".into())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Upstream Failure");
}

#[tokio::test]
async fn database_errors_hide_details() {
    let (status, body) = envelope(WebError::Database(sea_orm::DbErr::Custom(
        "connection reset by peer at 10.0.0.3".into(),
    )))
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal Server Error");
    assert_eq!(body["message"], "Database error");
}

#[test]
fn project_listing_omits_the_port() {
    let now = Utc::now().naive_utc();

    let project = MProject {
        id: Uuid::new_v4(),
        name: "hello".into(),
        repo_url: "https://github.com/acme/hello".into(),
        repo_id: Some(42),
        default_branch: "main".into(),
        root_directory: "./".into(),
        build_command: "npm run build".into(),
        framework: Framework::Vite,
        domain: Some("hello.apps.example.com".into()),
        port: 8001,
        installation: None,
        auto_deploy: true,
        created_at: now,
        updated_at: now,
    };

    let summary = ProjectSummary::from(project);
    let value = serde_json::to_value(&summary).unwrap();

    assert_eq!(value["name"], "hello");
    assert_eq!(value["domain"], "hello.apps.example.com");
    assert!(value.get("port").is_none());
}
