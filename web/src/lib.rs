/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod endpoints;
pub mod error;
#[cfg(test)]
mod tests;

use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use slipway_core::types::ServerState;
use std::sync::Arc;

pub fn router(state: Arc<ServerState>) -> Router {
    let cors_allow_origin = if state.cli.debug {
        AllowOrigin::any()
    } else {
        AllowOrigin::exact(state.cli.client_url.clone().try_into().unwrap())
    };

    let cors = CorsLayer::new()
        .allow_origin(cors_allow_origin)
        .allow_headers(vec![AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_methods(tower_http::cors::Any);

    Router::new()
        .route(
            "/projects",
            get(endpoints::projects::get_projects).post(endpoints::projects::post_project),
        )
        .route(
            "/projects/:project",
            get(endpoints::projects::get_project)
                .put(endpoints::projects::put_project)
                .delete(endpoints::projects::delete_project),
        )
        .route(
            "/projects/:project/deployment",
            get(endpoints::deployments::get_active_deployment),
        )
        .route("/projects/:project/stop", post(endpoints::deployments::post_stop))
        .route(
            "/projects/:project/builds",
            get(endpoints::builds::get_builds).post(endpoints::builds::post_build),
        )
        .route(
            "/projects/:project/env",
            get(endpoints::env_vars::get_env_vars).post(endpoints::env_vars::post_env_var),
        )
        .route(
            "/projects/:project/env/:key",
            delete(endpoints::env_vars::delete_env_var),
        )
        .route("/builds/queue", delete(endpoints::internal::delete_queue))
        .route(
            "/builds/:build",
            get(endpoints::builds::get_build).put(endpoints::internal::put_build_status),
        )
        .route(
            "/builds/:build/logs",
            get(endpoints::builds::get_build_logs)
                .post(endpoints::internal::post_build_logs)
                .delete(endpoints::builds::delete_build_logs),
        )
        .route(
            "/builds/:build/logs/stream",
            get(endpoints::builds::get_build_log_stream),
        )
        .route(
            "/deploy/build/:build/activate",
            post(endpoints::deployments::post_activate_build),
        )
        .route("/domains/check", get(endpoints::domains::get_domain_check))
        .route(
            "/github/installations",
            get(endpoints::github::get_installations),
        )
        .route(
            "/github/installations/:installation/repositories",
            get(endpoints::github::get_installation_repositories),
        )
        .route("/github/webhook", post(endpoints::github::post_webhook))
        .route("/health", get(endpoints::internal::get_health))
        .layer(cors)
        .with_state(state)
}

pub async fn serve_web(state: Arc<ServerState>) -> std::io::Result<()> {
    let server_url = format!("{}:{}", state.cli.ip.clone(), state.cli.port.clone());
    let app = router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&server_url).await?;
    axum::serve(listener, app).await
}
