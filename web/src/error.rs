/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use slipway_core::deployer::DeployerError;
use slipway_core::queue::QueueError;
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum WebError {
    Validation(String),
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    Upstream(String),
    InternalServerError(String),
    Database(DbErr),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Validation(msg) => write!(f, "Validation Error: {}", msg),
            WebError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            WebError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            WebError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            WebError::Upstream(msg) => write!(f, "Upstream Failure: {}", msg),
            WebError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            WebError::Database(err) => write!(f, "Database Error: {}", err),
        }
    }
}

impl std::error::Error for WebError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WebError::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            WebError::Validation(msg) => (StatusCode::BAD_REQUEST, "Validation Error", msg),
            WebError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", msg),
            WebError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "Unauthorized", msg),
            WebError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", msg),
            WebError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "Upstream Failure", msg),
            WebError::InternalServerError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", msg)
            }
            WebError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    "Database error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: kind.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<DbErr> for WebError {
    fn from(err: DbErr) -> Self {
        WebError::Database(err)
    }
}

impl From<JsonRejection> for WebError {
    fn from(rejection: JsonRejection) -> Self {
        WebError::Validation(format!("Invalid JSON: {}", rejection))
    }
}

impl From<DeployerError> for WebError {
    fn from(err: DeployerError) -> Self {
        WebError::Upstream(err.to_string())
    }
}

impl From<QueueError> for WebError {
    fn from(err: QueueError) -> Self {
        WebError::Upstream(format!("Queue error: {}", err))
    }
}

pub type WebResult<T> = Result<T, WebError>;

impl WebError {
    pub fn not_found(resource: &str) -> Self {
        WebError::NotFound(format!("{} not found", resource))
    }
}
