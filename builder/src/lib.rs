/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod commands;
pub mod logstream;
pub mod packaging;
pub mod runner;
pub mod types;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use slipway_core::queue::BuildJobData;
use std::sync::Arc;
use std::time::Duration;
use types::WorkerState;

/// Runs the queue consumer and the HTTP fallback surface side by side.
/// The consumer takes one job at a time; the machine's CPU, disk, and
/// network belong to the active build.
pub async fn start_worker(state: Arc<WorkerState>) -> std::io::Result<()> {
    tokio::spawn(consume_loop(Arc::clone(&state)));

    let server_url = format!("{}:{}", state.cli.ip, state.cli.port);

    let app = Router::new()
        .route("/build", post(post_build))
        .route("/health", get(get_health))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&server_url).await?;
    axum::serve(listener, app).await
}

async fn consume_loop(state: Arc<WorkerState>) {
    loop {
        match state.queue.dequeue(5.0).await {
            Ok(Some(job)) => {
                let build_id = job.build_id;
                tracing::info!(build = %build_id, "Picked up build job");

                if let Err(e) = runner::run_build_job(&state, job).await {
                    tracing::error!(build = %build_id, error = %e, "Build job failed");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Queue unavailable, backing off");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

async fn get_health() -> &'static str {
    "ok"
}

/// Direct trigger for when the queue path is unavailable. Accepts the same
/// payload as the queue and fires-and-forgets.
async fn post_build(
    state: State<Arc<WorkerState>>,
    Json(job): Json<BuildJobData>,
) -> (StatusCode, Json<serde_json::Value>) {
    let build_id = job.build_id;
    let state = Arc::clone(&state);

    tokio::spawn(async move {
        if let Err(e) = runner::run_build_job(&state, job).await {
            tracing::error!(build = %build_id, error = %e, "Direct build failed");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": true, "buildId": build_id })),
    )
}
