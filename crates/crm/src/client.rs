//! Thin HTTP client for the CRM's REST API.

use std::time::Duration;

use askdb_core::config::CrmConfig;
use askdb_core::routing::ToolDescriptor;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::catalog;

const DEFAULT_BASE_URL: &str = "http://localhost:5104";

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("crm request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("no CRM record found at {0}")]
    NotFound(String),
    #[error("crm returned status {status} for {path}")]
    Status { status: u16, path: String },
}

pub struct CrmClient {
    http: reqwest::Client,
    base_url: String,
}

impl CrmClient {
    pub fn from_config(config: &CrmConfig) -> Result<Self, CrmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self { http, base_url })
    }

    /// Confirms the CRM answers at all and returns the tool descriptors it
    /// backs. The card-counts endpoint is the cheapest argument-free call,
    /// so it doubles as the startup reachability check.
    pub async fn discover_tools(&self) -> Result<Vec<ToolDescriptor>, CrmError> {
        self.get_json("/api/SalesOpportunity/cards").await?;
        Ok(catalog::catalog())
    }

    async fn get_json(&self, path: &str) -> Result<Value, CrmError> {
        let url = format!("{}{path}", self.base_url);
        debug!(event_name = "crm.request", path, "crm lookup");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(CrmError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(CrmError::Status { status: status.as_u16(), path: path.to_string() });
        }

        Ok(response.json().await?)
    }

    pub async fn lead_info(&self, id: i64) -> Result<Value, CrmError> {
        self.get_json(&format!("/api/SalesLead/{id}")).await
    }

    pub async fn lead_quotations_with_items(&self, lead_id: &str) -> Result<Value, CrmError> {
        self.get_json(&format!("/api/SalesLead/{lead_id}/quotations-with-items")).await
    }

    pub async fn opportunity_card_counts(&self) -> Result<Value, CrmError> {
        self.get_json("/api/SalesOpportunity/cards").await
    }

    pub async fn active_opportunities_with_items(&self) -> Result<Value, CrmError> {
        self.get_json("/api/SalesOpportunity/with-items").await
    }

    pub async fn opportunity_with_items(&self, id_or_opportunity_id: &str) -> Result<Value, CrmError> {
        self.get_json(&format!("/api/SalesOpportunity/with-items/{id_or_opportunity_id}")).await
    }

    pub async fn opportunity_by_id(&self, opportunity_id: &str) -> Result<Value, CrmError> {
        self.get_json(&format!("/api/SalesOpportunity/{opportunity_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use askdb_core::config::CrmConfig;

    use super::{CrmClient, DEFAULT_BASE_URL};

    #[test]
    fn missing_base_url_falls_back_to_the_default_and_trailing_slash_is_trimmed() {
        let client = CrmClient::from_config(&CrmConfig {
            enabled: true,
            base_url: None,
            timeout_secs: 5,
        })
        .expect("client");
        assert_eq!(client.base_url, DEFAULT_BASE_URL);

        let client = CrmClient::from_config(&CrmConfig {
            enabled: true,
            base_url: Some("http://crm.internal:9000/".to_string()),
            timeout_secs: 5,
        })
        .expect("client");
        assert_eq!(client.base_url, "http://crm.internal:9000");
    }

    #[tokio::test]
    async fn discovery_errors_when_the_crm_does_not_answer() {
        // Port 9 (discard) refuses connections on a plain host.
        let client = CrmClient::from_config(&CrmConfig {
            enabled: true,
            base_url: Some("http://127.0.0.1:9".to_string()),
            timeout_secs: 1,
        })
        .expect("client");

        let error = client.discover_tools().await.unwrap_err();
        assert!(matches!(error, super::CrmError::Transport(_)));
    }
}
