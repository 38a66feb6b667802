/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::{DateTime, NaiveDateTime};
use std::ops::RangeInclusive;
use std::sync::LazyLock;

pub const PORT_RANGE: RangeInclusive<usize> = 1..=65535;

pub static NULL_TIME: LazyLock<NaiveDateTime> =
    LazyLock::new(|| DateTime::from_timestamp(0, 0).unwrap().naive_utc());

/// Application ports are handed out starting above this value.
pub const BASE_APP_PORT: i32 = 8000;

/// Subdomains that may never be taken by a project.
pub const RESERVED_SUBDOMAINS: [&str; 10] = [
    "www",
    "api",
    "admin",
    "dashboard",
    "deploy",
    "git",
    "db",
    "mail",
    "staging",
    "dev",
];

/// A build command segment must start with one of these programs.
pub const ALLOWED_COMMAND_PREFIXES: [&str; 6] = ["npm", "yarn", "pnpm", "bun", "echo", "ls"];

/// Substrings rejected anywhere in a build command.
pub const FORBIDDEN_COMMAND_PATTERNS: [&str; 13] = [
    "rm -rf",
    "sudo",
    "wget",
    "curl",
    "eval",
    "|",
    ";",
    ">",
    "<",
    "/etc/passwd",
    "/etc/shadow",
    "/bin/sh",
    "/bin/bash",
];

/// Per-topic backlog for live log subscribers. Laggards lose messages
/// instead of blocking the publisher.
pub const LOG_CHANNEL_CAPACITY: usize = 256;

/// Retention of finished jobs on the queue's bookkeeping lists.
pub const QUEUE_COMPLETED_RETENTION: isize = 100;
pub const QUEUE_FAILED_RETENTION: isize = 50;
