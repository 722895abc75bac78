//! HTTP client for the mining/topic microservice.
//!
//! Two fire-and-forget calls: kick off issue mining for an environment and
//! request topic generation over its mined issues. Both carry the service
//! credential headers; results come back later through callback updates, so
//! a 2xx here only means the request was accepted.

use std::time::Duration;

use async_trait::async_trait;

use seco_core::gateway::{MiningGateway, TopicGateway};
use seco_core::types::DbId;
use seco_core::{CoreError, Environment};

use crate::config::ServiceConfig;

/// HTTP request timeout for a single microservice call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the mining/topic microservice API.
pub struct ServiceApiClient {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl ServiceApiClient {
    pub fn new(config: ServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client, config }
    }

    async fn post(&self, path: &str, payload: &serde_json::Value) -> Result<(), CoreError> {
        let url = format!("{}{path}", self.config.api_base);
        let response = self
            .client
            .post(&url)
            .header("service-login", &self.config.login)
            .header("service-pwd", &self.config.password)
            .json(payload)
            .send()
            .await
            .map_err(|e| CoreError::Upstream(format!("POST {path}: {e}")))?;
        if !response.status().is_success() {
            return Err(CoreError::Upstream(format!(
                "POST {path} returned HTTP {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MiningGateway for ServiceApiClient {
    async fn request_mining(&self, environment: &Environment) -> Result<(), CoreError> {
        let filters = &environment.mining.filters;
        let payload = serde_json::json!({
            "environment_id": environment.id,
            "repos": environment.mining.repos,
            "filter_type": filters.filter_type,
            "keywords": filters.keywords,
            "user_id": environment.owner_id,
            "rcr_keywords": filters.rcr_keywords,
            "mining_filter_date_since": filters.date_since,
            "mining_filter_date_until": filters.date_until,
            "mining_issues_status": filters.issues_status,
        });
        self.post("/github/mining/repos", &payload).await?;
        tracing::info!(environment_id = environment.id, "Mining requested");
        Ok(())
    }
}

#[async_trait]
impl TopicGateway for ServiceApiClient {
    async fn request_topics(&self, environment_id: DbId) -> Result<(), CoreError> {
        let payload = serde_json::json!({ "environment_id": environment_id });
        self.post("/request/topics", &payload).await?;
        tracing::info!(environment_id, "Topic generation requested");
        Ok(())
    }
}
