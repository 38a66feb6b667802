/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use clap::Parser;
use slipway_core::logsink::HttpLogSink;
use slipway_core::queue::BuildQueue;
use slipway_core::types::WorkerCli;
use std::sync::Arc;

#[derive(Debug)]
pub struct WorkerState {
    pub cli: WorkerCli,
    pub sink: HttpLogSink,
    pub queue: BuildQueue,
    pub http: reqwest::Client,
}

pub async fn init_state() -> Arc<WorkerState> {
    let cli = WorkerCli::parse();

    tracing::info!("Starting Slipway builder on {}:{}", cli.ip, cli.port);

    let queue = match BuildQueue::connect(&cli.redis_url) {
        Ok(queue) => queue,
        Err(e) => {
            eprintln!("Failed to connect to Redis at {}: {}", cli.redis_url, e);
            std::process::exit(1);
        }
    };

    let sink = HttpLogSink::new(cli.control_api_url.clone());

    Arc::new(WorkerState {
        sink,
        queue,
        http: reqwest::Client::new(),
        cli,
    })
}
