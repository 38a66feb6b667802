/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod builds;
pub mod deployments;
pub mod domains;
pub mod env_vars;
pub mod github;
pub mod internal;
pub mod projects;
