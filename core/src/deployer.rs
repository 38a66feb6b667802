/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use entity::project::Framework;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    pub project_id: Uuid,
    pub build_id: Uuid,
    pub port: i32,
    pub app_type: Framework,
    pub subdomain: Option<String>,
    pub env_vars: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRequest {
    pub port: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteProjectRequest {
    pub port: Option<i32>,
    pub subdomain: Option<String>,
    pub build_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
struct PortCheckResponse {
    available: bool,
}

#[derive(Debug, Error)]
pub enum DeployerError {
    #[error("Deploy engine unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("Deploy engine rejected the request: {0}")]
    Failed(String),
}

/// The control plane's view of the deploy engine. One implementation talks
/// HTTP to the engine process; tests can substitute their own.
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn check_port(&self, port: i32) -> Result<bool, DeployerError>;
    async fn activate(&self, req: &ActivateRequest) -> Result<(), DeployerError>;
    async fn stop(&self, req: &StopRequest) -> Result<(), DeployerError>;
    async fn delete_project(
        &self,
        project_id: Uuid,
        req: &DeleteProjectRequest,
    ) -> Result<(), DeployerError>;
}

#[derive(Debug, Clone)]
pub struct HttpDeployer {
    base_url: String,
    http: reqwest::Client,
}

impl HttpDeployer {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self { base_url, http }
    }

    async fn expect_success(res: reqwest::Response) -> Result<(), DeployerError> {
        if res.status().is_success() {
            return Ok(());
        }

        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        Err(DeployerError::Failed(format!("{}: {}", status, body.trim())))
    }
}

#[async_trait]
impl Deployer for HttpDeployer {
    async fn check_port(&self, port: i32) -> Result<bool, DeployerError> {
        let res = self
            .http
            .post(format!("{}/ports/check", self.base_url))
            .json(&serde_json::json!({ "port": port }))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(DeployerError::Failed(format!(
                "port check returned {}",
                res.status()
            )));
        }

        let body: PortCheckResponse = res.json().await?;
        Ok(body.available)
    }

    async fn activate(&self, req: &ActivateRequest) -> Result<(), DeployerError> {
        let res = self
            .http
            .post(format!("{}/activate", self.base_url))
            .json(req)
            .send()
            .await?;

        Self::expect_success(res).await
    }

    async fn stop(&self, req: &StopRequest) -> Result<(), DeployerError> {
        let res = self
            .http
            .post(format!("{}/stop", self.base_url))
            .json(req)
            .send()
            .await?;

        Self::expect_success(res).await
    }

    async fn delete_project(
        &self,
        project_id: Uuid,
        req: &DeleteProjectRequest,
    ) -> Result<(), DeployerError> {
        let res = self
            .http
            .post(format!("{}/projects/{}/delete", self.base_url, project_id))
            .json(req)
            .send()
            .await?;

        Self::expect_success(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn activate_request_wire_format() {
        let request = ActivateRequest {
            project_id: Uuid::nil(),
            build_id: Uuid::nil(),
            port: 8001,
            app_type: Framework::from_str("vite").unwrap(),
            subdomain: Some("hello".to_string()),
            env_vars: HashMap::from([("KEY".to_string(), "value".to_string())]),
        };

        let value = serde_json::to_value(&request).unwrap();

        assert!(value.get("projectId").is_some());
        assert!(value.get("buildId").is_some());
        assert_eq!(value["appType"], "vite");
        assert_eq!(value["subdomain"], "hello");
        assert_eq!(value["envVars"]["KEY"], "value");
        assert_eq!(value["port"], 8001);
    }

    #[test]
    fn stop_request_omits_empty_fields() {
        let request = StopRequest {
            port: 8001,
            project_id: None,
            build_id: None,
        };

        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["port"], 8001);
        assert!(value.get("projectId").is_none());
        assert!(value.get("buildId").is_none());
    }

    #[test]
    fn delete_request_round_trips() {
        let request = DeleteProjectRequest {
            port: Some(8001),
            subdomain: Some("hello".to_string()),
            build_ids: vec![Uuid::nil()],
        };

        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: DeleteProjectRequest = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.port, Some(8001));
        assert_eq!(decoded.subdomain.as_deref(), Some("hello"));
        assert_eq!(decoded.build_ids, vec![Uuid::nil()]);
    }
}
