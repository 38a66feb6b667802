/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod consts;
pub mod crypto;
pub mod database;
pub mod deployer;
pub mod github;
pub mod input;
pub mod logs;
pub mod logsink;
pub mod queue;
pub mod types;

use clap::Parser;
use database::connect_db;
use std::sync::Arc;
use types::*;

pub async fn init_state() -> Arc<ServerState> {
    let cli = Cli::parse();

    let encryption_key = match crypto::parse_encryption_key(&cli.encryption_key) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("Invalid ENCRYPTION_KEY: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting Slipway control plane on {}:{}", cli.ip, cli.port);

    let db = connect_db(&cli).await;

    let queue = match queue::BuildQueue::connect(&cli.redis_url) {
        Ok(queue) => queue,
        Err(e) => {
            eprintln!("Failed to connect to Redis at {}: {}", cli.redis_url, e);
            std::process::exit(1);
        }
    };

    let deployer = deployer::HttpDeployer::new(cli.deploy_engine_url.clone());
    let worker = WorkerClient::new(cli.build_worker_url.clone());

    Arc::new(ServerState {
        db,
        queue,
        hub: logs::LogHub::new(),
        deployer,
        worker,
        encryption_key,
        http: reqwest::Client::new(),
        cli,
    })
}
