//! Routing vocabulary shared by the model-facing agents and the workflow.
//!
//! The primary router asks the model to pick one of a closed set of tools.
//! Model output is JSON and is parsed strictly: an unknown tool name is a
//! routing failure, never silently coerced to the general-answer path.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::WorkflowError;

/// One entry in the catalog of tools offered to the routing model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into() }
    }
}

/// The closed set of destinations the primary router may pick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryTool {
    CrmAgent,
    SqlRouterAgent,
    ClarifyQuery,
    VisualizationAgent,
    GeneralQuery,
}

impl QueryTool {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "CRM_AGENT" => Some(Self::CrmAgent),
            "SQL_ROUTER_AGENT" => Some(Self::SqlRouterAgent),
            "CLARIFY_QUERY" => Some(Self::ClarifyQuery),
            "VISUALIZATION_AGENT" => Some(Self::VisualizationAgent),
            "GENERAL_QUERY" => Some(Self::GeneralQuery),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrmAgent => "CRM_AGENT",
            Self::SqlRouterAgent => "SQL_ROUTER_AGENT",
            Self::ClarifyQuery => "CLARIFY_QUERY",
            Self::VisualizationAgent => "VISUALIZATION_AGENT",
            Self::GeneralQuery => "GENERAL_QUERY",
        }
    }
}

/// Parsed verdict of the primary routing call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingDecision {
    pub tool: QueryTool,
    /// Set when the model named a concrete CRM tool instead of `CRM_AGENT`.
    pub crm_tool_hint: Option<String>,
    pub secondary_tool: Option<QueryTool>,
    pub fallback_tool: Option<QueryTool>,
    pub reasoning: String,
}

impl RoutingDecision {
    /// Parses the router model's JSON reply against the known tool set plus
    /// the live CRM catalog. Unknown primary tool names are errors.
    pub fn parse(raw: &str, crm_catalog: &[ToolDescriptor]) -> Result<Self, WorkflowError> {
        let stripped = strip_code_fences(raw);
        let value: Value = serde_json::from_str(&stripped)
            .map_err(|err| WorkflowError::Routing(format!("router reply is not JSON: {err}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| WorkflowError::Routing("router reply is not a JSON object".into()))?;

        let tool_name = object
            .get("tool_name")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkflowError::Routing("router reply is missing `tool_name`".into()))?;

        let (tool, crm_tool_hint) = match QueryTool::parse(tool_name) {
            Some(tool) => (tool, None),
            None => {
                let known = crm_catalog.iter().any(|entry| entry.name == tool_name.trim());
                if !known {
                    return Err(WorkflowError::Routing(format!(
                        "router picked unknown tool `{tool_name}`"
                    )));
                }
                (QueryTool::CrmAgent, Some(tool_name.trim().to_string()))
            }
        };

        let secondary_tool =
            object.get("secondary_tool").and_then(Value::as_str).and_then(QueryTool::parse);
        let fallback_tool =
            object.get("fallback_tool").and_then(Value::as_str).and_then(QueryTool::parse);
        let reasoning = object
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self { tool, crm_tool_hint, secondary_tool, fallback_tool, reasoning })
    }
}

/// Table and column hints from the schema-selection routing call. The
/// reasoning string is carried for logging and is empty when the model
/// leaves it out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SqlRoutingHints {
    pub relevant_tables: Vec<String>,
    pub relevant_columns: Vec<String>,
    pub reasoning: String,
}

impl SqlRoutingHints {
    pub fn parse(raw: &str) -> Result<Self, WorkflowError> {
        let stripped = strip_code_fences(raw);
        let value: Value = serde_json::from_str(&stripped).map_err(|err| {
            WorkflowError::Schema(format!("schema router reply is not JSON: {err}"))
        })?;

        let object = value.as_object().ok_or_else(|| {
            WorkflowError::Schema("schema router reply is not a JSON object".into())
        })?;

        let relevant_tables = string_array(object.get("relevant_tables"));
        let relevant_columns = string_array(object.get("relevant_columns"));
        let reasoning = object
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if relevant_tables.is_empty() {
            return Err(WorkflowError::Schema(
                "schema router selected no relevant tables".into(),
            ));
        }

        Ok(Self { relevant_tables, relevant_columns, reasoning })
    }
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Strips a Markdown code fence (```json, ```sql, or bare ```) from a model
/// reply, returning the inner text. Replies without fences pass through.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    // Drop the language tag on the opening fence line, if any.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };

    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::{strip_code_fences, QueryTool, RoutingDecision, SqlRoutingHints, ToolDescriptor};
    use crate::errors::WorkflowError;

    fn catalog() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("get_lead_info", "Retrieves a sales lead by id."),
            ToolDescriptor::new("get_sales_opportunity_by_id", "Retrieves an opportunity."),
        ]
    }

    #[test]
    fn parses_plain_routing_reply() {
        let raw = r#"{"tool_name": "SQL_ROUTER_AGENT", "reasoning": "database question"}"#;
        let decision = RoutingDecision::parse(raw, &catalog()).unwrap();
        assert_eq!(decision.tool, QueryTool::SqlRouterAgent);
        assert_eq!(decision.reasoning, "database question");
        assert!(decision.secondary_tool.is_none());
    }

    #[test]
    fn parses_fenced_reply_with_secondary_and_fallback() {
        let raw = "```json\n{\"tool_name\": \"CRM_AGENT\", \"secondary_tool\": \"VISUALIZATION_AGENT\", \"fallback_tool\": \"SQL_ROUTER_AGENT\", \"reasoning\": \"record lookup\"}\n```";
        let decision = RoutingDecision::parse(raw, &catalog()).unwrap();
        assert_eq!(decision.tool, QueryTool::CrmAgent);
        assert_eq!(decision.secondary_tool, Some(QueryTool::VisualizationAgent));
        assert_eq!(decision.fallback_tool, Some(QueryTool::SqlRouterAgent));
    }

    #[test]
    fn concrete_crm_tool_name_maps_to_crm_agent_with_hint() {
        let raw = r#"{"tool_name": "get_lead_info", "reasoning": "lead lookup"}"#;
        let decision = RoutingDecision::parse(raw, &catalog()).unwrap();
        assert_eq!(decision.tool, QueryTool::CrmAgent);
        assert_eq!(decision.crm_tool_hint.as_deref(), Some("get_lead_info"));
    }

    #[test]
    fn unknown_tool_name_is_a_routing_error() {
        let raw = r#"{"tool_name": "DELETE_EVERYTHING", "reasoning": "??"}"#;
        let error = RoutingDecision::parse(raw, &catalog()).unwrap_err();
        assert!(matches!(error, WorkflowError::Routing(message) if message.contains("DELETE_EVERYTHING")));
    }

    #[test]
    fn non_json_reply_is_a_routing_error() {
        let error = RoutingDecision::parse("sure, let me route that", &catalog()).unwrap_err();
        assert!(matches!(error, WorkflowError::Routing(_)));
    }

    #[test]
    fn sql_hints_require_at_least_one_table() {
        let raw = r#"{"relevant_tables": [], "relevant_columns": ["status"]}"#;
        let error = SqlRoutingHints::parse(raw).unwrap_err();
        assert!(matches!(error, WorkflowError::Schema(_)));
    }

    #[test]
    fn sql_hints_trim_and_drop_blank_entries() {
        let raw = r#"{"relevant_tables": [" opportunities ", ""], "relevant_columns": ["status", "count"], "reasoning": "status breakdown"}"#;
        let hints = SqlRoutingHints::parse(raw).unwrap();
        assert_eq!(hints.relevant_tables, vec!["opportunities"]);
        assert_eq!(hints.relevant_columns, vec!["status", "count"]);
        assert_eq!(hints.reasoning, "status breakdown");
    }

    #[test]
    fn fence_stripping_handles_language_tags_and_bare_text() {
        assert_eq!(strip_code_fences("```sql\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("SELECT 1;"), "SELECT 1;");
    }
}
