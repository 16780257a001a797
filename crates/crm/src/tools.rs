//! Bridges the CRM client into the agent's tool-executor seam.

use askdb_agent::crm_loop::{CrmToolExecutor, Observation};
use askdb_core::routing::ToolDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::args::{self, ArgError};
use crate::catalog;
use crate::client::{CrmClient, CrmError};

#[derive(Debug, Error)]
enum ToolError {
    #[error(transparent)]
    Args(#[from] ArgError),
    #[error(transparent)]
    Crm(#[from] CrmError),
    #[error("unknown CRM tool `{0}`")]
    Unknown(String),
}

/// Executes the catalog's tools against a live CRM. Every failure, argument
/// or transport, comes back as an observation so the conversation can react
/// instead of aborting.
pub struct CrmToolRunner {
    client: CrmClient,
    catalog: Vec<ToolDescriptor>,
}

impl CrmToolRunner {
    pub fn new(client: CrmClient) -> Self {
        Self { client, catalog: catalog::catalog() }
    }

    async fn dispatch(&self, tool: &str, input: &Value) -> Result<String, ToolError> {
        let payload = match tool {
            catalog::GET_LEAD_INFO => {
                let id = args::int_arg(input, "id")?;
                self.client.lead_info(id).await?
            }
            catalog::GET_SALES_LEAD_QUOTATIONS_WITH_ITEMS => {
                let lead_id = args::str_arg(input, "leadId")?;
                self.client.lead_quotations_with_items(&lead_id).await?
            }
            catalog::GET_SALES_OPPORTUNITY_CARD_COUNTS => {
                self.client.opportunity_card_counts().await?
            }
            catalog::GET_ACTIVE_OPPORTUNITIES_WITH_ITEMS => {
                self.client.active_opportunities_with_items().await?
            }
            catalog::GET_OPPORTUNITY_BY_ID_WITH_ITEMS => {
                let id = args::str_arg(input, "id_or_opportunity_id")?;
                self.client.opportunity_with_items(&id).await?
            }
            catalog::GET_SALES_OPPORTUNITY_BY_ID => {
                let id = args::str_arg(input, "opportunityId")?;
                self.client.opportunity_by_id(&id).await?
            }
            other => return Err(ToolError::Unknown(other.to_string())),
        };

        serde_json::to_string_pretty(&payload)
            .map_err(|error| ToolError::Unknown(format!("unserializable payload: {error}")))
    }
}

#[async_trait]
impl CrmToolExecutor for CrmToolRunner {
    fn catalog(&self) -> &[ToolDescriptor] {
        &self.catalog
    }

    async fn execute(&self, tool: &str, input: &Value) -> Observation {
        let content = match self.dispatch(tool, input).await {
            Ok(payload) => payload,
            Err(error) => {
                warn!(event_name = "crm.tool_failed", tool, error = %error, "crm tool failed");
                format!("Error: {error}")
            }
        };

        Observation { tool: tool.to_string(), content }
    }
}
