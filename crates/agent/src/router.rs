//! The two routing calls: primary tool selection, then table selection for
//! the SQL path.

use askdb_core::errors::WorkflowError;
use askdb_core::routing::{QueryTool, RoutingDecision, SqlRoutingHints, ToolDescriptor};
use askdb_core::SchemaMap;
use tracing::{debug, info};

use crate::chart::wants_visualization;
use crate::llm::LlmClient;
use crate::prompts;

/// Asks the model to pick a primary tool for `question`.
///
/// Post-processing mirrors two fixed rules: a visualization keyword in the
/// question always sets the secondary tool, and with an empty CRM catalog a
/// CRM pick is rewritten to its fallback (or the SQL path) since there is
/// nothing to call.
pub async fn route_primary(
    llm: &dyn LlmClient,
    question: &str,
    crm_catalog: &[ToolDescriptor],
) -> Result<RoutingDecision, WorkflowError> {
    let system = prompts::primary_routing_system(crm_catalog);
    let raw = llm
        .complete(&system, question)
        .await
        .map_err(|err| WorkflowError::Routing(err.to_string()))?;

    let mut decision = RoutingDecision::parse(&raw, crm_catalog)?;

    if wants_visualization(question) && decision.secondary_tool.is_none() {
        decision.secondary_tool = Some(QueryTool::VisualizationAgent);
    }

    if crm_catalog.is_empty() && decision.tool == QueryTool::CrmAgent {
        let rerouted = decision.fallback_tool.unwrap_or(QueryTool::SqlRouterAgent);
        info!(
            event_name = "routing.crm_unavailable",
            rerouted = rerouted.as_str(),
            "crm catalog empty, rerouting crm decision"
        );
        decision.tool = rerouted;
        decision.crm_tool_hint = None;
        decision.fallback_tool = None;
    }

    debug!(
        event_name = "routing.primary_decision",
        tool = decision.tool.as_str(),
        secondary = decision.secondary_tool.map(|t| t.as_str()).unwrap_or("-"),
        fallback = decision.fallback_tool.map(|t| t.as_str()).unwrap_or("-"),
        "primary route selected"
    );

    Ok(decision)
}

/// Asks the model which tables and columns the question needs, against the
/// merged schema map.
pub async fn route_sql_hints(
    llm: &dyn LlmClient,
    question: &str,
    schema_map: &SchemaMap,
) -> Result<SqlRoutingHints, WorkflowError> {
    let system = prompts::schema_selection_system(&schema_map.to_prompt_json());
    let raw = llm
        .complete(&system, question)
        .await
        .map_err(|err| WorkflowError::Schema(err.to_string()))?;

    let hints = SqlRoutingHints::parse(&raw)?;
    debug!(
        event_name = "routing.sql_hints",
        tables = hints.relevant_tables.join(","),
        "schema selection complete"
    );
    Ok(hints)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use askdb_core::errors::WorkflowError;
    use askdb_core::routing::{QueryTool, ToolDescriptor};
    use askdb_core::SchemaMap;
    use async_trait::async_trait;

    use super::{route_primary, route_sql_hints};
    use crate::llm::LlmClient;

    struct FixedLlm {
        reply: Result<String, String>,
        seen_user: Mutex<Vec<String>>,
    }

    impl FixedLlm {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(reply.to_string()), seen_user: Mutex::new(Vec::new()) })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self { reply: Err(message.to_string()), seen_user: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _system: &str, user: &str) -> Result<String> {
            self.seen_user.lock().expect("lock").push(user.to_string());
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(message) => Err(anyhow!(message.clone())),
            }
        }
    }

    fn catalog() -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new("get_lead_info", "Lead by id.")]
    }

    #[tokio::test]
    async fn visualization_keyword_forces_secondary_tool() {
        let llm = FixedLlm::ok(r#"{"tool_name": "SQL_ROUTER_AGENT", "reasoning": "data"}"#);
        let decision = route_primary(llm.as_ref(), "Show a bar chart of sales", &catalog())
            .await
            .expect("route");
        assert_eq!(decision.secondary_tool, Some(QueryTool::VisualizationAgent));
    }

    #[tokio::test]
    async fn empty_catalog_rewrites_crm_pick_to_fallback() {
        let llm = FixedLlm::ok(
            r#"{"tool_name": "CRM_AGENT", "fallback_tool": "SQL_ROUTER_AGENT", "reasoning": "record"}"#,
        );
        let decision =
            route_primary(llm.as_ref(), "Show me opportunity OPP001", &[]).await.expect("route");
        assert_eq!(decision.tool, QueryTool::SqlRouterAgent);
        assert!(decision.fallback_tool.is_none());
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_routing_error() {
        let llm = FixedLlm::failing("connection refused");
        let error = route_primary(llm.as_ref(), "anything", &catalog()).await.unwrap_err();
        assert!(matches!(error, WorkflowError::Routing(ref detail) if detail.contains("connection refused")));
    }

    #[tokio::test]
    async fn sql_hints_parse_from_model_reply() {
        let llm = FixedLlm::ok(r#"{"relevant_tables": ["opportunities"], "relevant_columns": ["status"]}"#);
        let hints = route_sql_hints(llm.as_ref(), "open opportunities?", &SchemaMap::default())
            .await
            .expect("hints");
        assert_eq!(hints.relevant_tables, vec!["opportunities"]);
    }
}
