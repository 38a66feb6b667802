/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::extract::{Query, State};
use axum::Json;
use slipway_core::input::valid_subdomain;
use slipway_core::types::*;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::WebResult;

#[derive(Deserialize)]
pub struct DomainCheckQuery {
    pub subdomain: String,
}

#[derive(Serialize)]
pub struct DomainCheckResponse {
    pub available: bool,
}

/// A subdomain is available when it satisfies the grammar, is not
/// reserved, and no project holds it yet.
pub async fn get_domain_check(
    state: State<Arc<ServerState>>,
    Query(query): Query<DomainCheckQuery>,
) -> WebResult<Json<DomainCheckResponse>> {
    if !valid_subdomain(&query.subdomain) {
        return Ok(Json(DomainCheckResponse { available: false }));
    }

    let fqdn = format!("{}.{}", query.subdomain, state.cli.base_domain);

    let taken = EProject::find()
        .filter(CProject::Domain.eq(fqdn))
        .one(&state.db)
        .await?
        .is_some();

    Ok(Json(DomainCheckResponse { available: !taken }))
}
