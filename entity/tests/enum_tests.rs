/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for entity enums

use entity::build::BuildStatus;
use entity::log_entry::LogLevel;
use entity::project::Framework;
use std::str::FromStr;

#[test]
fn test_framework_from_str() {
    assert_eq!(Framework::from_str("nextjs").unwrap(), Framework::NextJs);
    assert_eq!(Framework::from_str("vite").unwrap(), Framework::Vite);
    assert_eq!(Framework::from_str("express").unwrap(), Framework::Express);
    assert_eq!(Framework::from_str("hono").unwrap(), Framework::Hono);
    assert_eq!(Framework::from_str("elysia").unwrap(), Framework::Elysia);

    assert!(Framework::from_str("rails").is_err());
    assert!(Framework::from_str("").is_err());
}

#[test]
fn test_framework_categories() {
    assert!(Framework::NextJs.is_frontend());
    assert!(Framework::Vite.is_frontend());
    assert!(Framework::Express.is_backend());
    assert!(Framework::Hono.is_backend());
    assert!(Framework::Elysia.is_backend());
}

#[test]
fn test_framework_requires_install() {
    assert!(!Framework::Vite.requires_install());
    assert!(Framework::NextJs.requires_install());
    assert!(Framework::Express.requires_install());
}

#[test]
fn test_build_status_terminal() {
    assert!(!BuildStatus::Pending.is_terminal());
    assert!(!BuildStatus::Building.is_terminal());
    assert!(BuildStatus::Success.is_terminal());
    assert!(BuildStatus::Failed.is_terminal());
}

#[test]
fn test_build_status_round_trip() {
    for status in [
        BuildStatus::Pending,
        BuildStatus::Building,
        BuildStatus::Success,
        BuildStatus::Failed,
    ] {
        assert_eq!(BuildStatus::from_str(status.as_str()).unwrap(), status);
    }

    assert!(BuildStatus::from_str("aborted").is_err());
}

#[test]
fn test_log_level_round_trip() {
    for level in [
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Success,
        LogLevel::Deploy,
    ] {
        assert_eq!(LogLevel::from_str(level.as_str()).unwrap(), level);
    }

    assert!(LogLevel::from_str("debug").is_err());
}
