//! Prompt text for every model call in the workflow, kept in one place so
//! the agents stay logic-only.

use askdb_core::routing::{QueryTool, ToolDescriptor};

use crate::crm_loop::Observation;
use crate::llm::{ChatRole, ChatTurn};

pub const VISUALIZATION_KEYWORDS: [&str; 7] =
    ["chart", "graph", "plot", "visualize", "pie", "bar", "line"];

/// Fixed meta-tools always offered to the primary router. `CRM_AGENT` is
/// appended separately, and only when the live catalog is non-empty.
fn meta_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            QueryTool::ClarifyQuery.as_str(),
            "Use when the request is ambiguous or missing required parameters like IDs. \
             Generates a question to get the missing information.",
        ),
        ToolDescriptor::new(
            QueryTool::SqlRouterAgent.as_str(),
            "Use for questions requiring database analysis or querying. Includes questions \
             about sales, customers, products, leads, opportunities, and similar.",
        ),
        ToolDescriptor::new(
            QueryTool::VisualizationAgent.as_str(),
            "Use when the user requests a data visualization (charts/graphs). Always used \
             in conjunction with either CRM_AGENT or SQL_ROUTER_AGENT.",
        ),
        ToolDescriptor::new(
            QueryTool::GeneralQuery.as_str(),
            "Use for general questions not requiring specialized tools.",
        ),
    ]
}

pub fn primary_routing_system(crm_catalog: &[ToolDescriptor]) -> String {
    let mut tools = Vec::new();
    if !crm_catalog.is_empty() {
        tools.push(ToolDescriptor::new(
            QueryTool::CrmAgent.as_str(),
            "Handles queries that require the CRM system, like retrieving a specific lead \
             or opportunity by ID. Primary choice for direct record lookups. If no CRM tool \
             is a perfect match, propose SQL_ROUTER_AGENT as a fallback_tool.",
        ));
        tools.extend(crm_catalog.iter().cloned());
    }
    tools.extend(meta_tools());

    let catalog_json =
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string());
    let keywords = VISUALIZATION_KEYWORDS
        .iter()
        .map(|kw| format!("'{kw}'"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are an expert routing agent that determines the best tool(s) for a user query.\n\
         Follow this priority hierarchy and special cases:\n\n\
         --- HIERARCHICAL PRIORITY ---\n\
         1. CRM_AGENT: for specific CRM record operations (retrieving a single record by ID).\n\
         2. CLARIFY_QUERY: for ambiguous requests or missing parameters.\n\
         3. SQL_ROUTER_AGENT: for database queries and analysis.\n\
         4. GENERAL_QUERY: for everything else.\n\n\
         --- SPECIAL CASES ---\n\
         * If a query looks CRM-shaped but is general (\"list all opportunities\" rather than \
         \"show me opportunity OPP001\"), pick SQL_ROUTER_AGENT as the primary tool.\n\
         * If a query targets a specific CRM record that might not exist, set \
         SQL_ROUTER_AGENT as fallback_tool.\n\
         * For visualization requests (terms like {keywords}), add VISUALIZATION_AGENT as \
         secondary_tool alongside the data tool.\n\n\
         --- AVAILABLE TOOLS ---\n\
         {catalog_json}\n\n\
         Respond with JSON containing:\n\
         - tool_name: primary tool (required)\n\
         - secondary_tool: optional tool (for visualization)\n\
         - fallback_tool: optional tool to use if the primary tool fails\n\
         - reasoning: explanation of the decision"
    )
}

pub fn schema_selection_system(schema_map_json: &str) -> String {
    format!(
        "You select the database tables and columns needed to answer a user's question.\n\
         The conceptual schema map below lists each table with its columns, business \
         synonyms, and notes.\n\n\
         --- SCHEMA MAP ---\n\
         {schema_map_json}\n\
         --- END SCHEMA MAP ---\n\n\
         Respond with JSON containing:\n\
         - relevant_tables: array of table names needed for the question (required)\n\
         - relevant_columns: array of column names likely referenced\n\
         - reasoning: brief explanation of the selection\n\
         Pick only tables that exist in the schema map."
    )
}

pub fn sql_generation_system(formatted_schema: &str) -> String {
    format!(
        "You are an expert SQLite SQL query generator. Translate the user's question into \
         one accurate, efficient SQL query.\n\n\
         --- RELEVANT DATABASE SCHEMA CONTEXT ---\n\
         {formatted_schema}\n\
         --- END RELEVANT DATABASE SCHEMA CONTEXT ---\n\n\
         Instructions:\n\
         1. NEVER generate DELETE, UPDATE, INSERT, CREATE, ALTER, DROP, or TRUNCATE statements.\n\
         2. Strictly use only the tables and columns in the schema context. Do not invent names.\n\
         3. Use explicit JOINs along the PRIMARY KEY / REFERENCES relationships shown.\n\
         4. Qualify ambiguous column names with short table aliases.\n\
         5. Use LIMIT when the user asks for \"top N\" or \"first N\".\n\
         6. Use aggregate functions with GROUP BY and alias the result (e.g. COUNT(*) AS count).\n\
         7. Use LIKE with LOWER() for case-insensitive text matching; dates are 'YYYY-MM-DD'.\n\
         8. Return ONLY the SQL query string, no explanations and no markdown fences.\n\
         If the question cannot be answered from this schema, respond with exactly: \
         Error: <short reason>"
    )
}

pub fn clarification_system(reasoning: &str) -> String {
    format!(
        "The user's request could not be routed because it is ambiguous or incomplete.\n\
         Routing notes: {reasoning}\n\
         Ask exactly one short, polite clarifying question that would let the request \
         proceed. Respond with the question only."
    )
}

pub fn general_answer_system() -> String {
    "You are a helpful assistant for a sales organization. Answer the user's question \
     directly and concisely. You have no database or CRM access for this question; do not \
     fabricate specific records or figures."
        .to_string()
}

pub fn final_narration_system(sql: Option<&str>, table_markdown: &str, error: &str) -> String {
    let sql_block = sql.unwrap_or("(none)");
    let error_block = if error.is_empty() { "(none)" } else { error };
    format!(
        "You summarize database query results for a business user.\n\n\
         SQL executed:\n{sql_block}\n\n\
         Result rows (Markdown):\n{table_markdown}\n\n\
         Error context: {error_block}\n\n\
         Write a concise, friendly answer to the user's question grounded ONLY in the rows \
         above. Include the Markdown table when it helps. If an error is present, explain \
         it politely without technical jargon."
    )
}

pub fn crm_conversation_system(catalog: &[ToolDescriptor]) -> String {
    let catalog_json =
        serde_json::to_string_pretty(catalog).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You answer CRM questions by calling tools. Available tools:\n\
         {catalog_json}\n\n\
         On each turn respond with exactly one JSON object, either:\n\
         {{\"action\": \"<tool name>\", \"input\": {{...arguments...}}}}\n\
         to call a tool, or:\n\
         {{\"final\": \"<answer text>\"}}\n\
         when you can answer. Base final answers only on tool observations. If a lookup \
         failed or returned nothing, say so starting with \"I am sorry\"."
    )
}

pub fn crm_conversation_user(
    question: &str,
    history: &[ChatTurn],
    observations: &[Observation],
) -> String {
    let mut out = String::new();

    if !history.is_empty() {
        out.push_str("Conversation so far:\n");
        for turn in history {
            let speaker = match turn.role {
                ChatRole::Human => "User",
                ChatRole::Assistant => "Assistant",
            };
            out.push_str(&format!("{speaker}: {}\n", turn.content));
        }
        out.push('\n');
    }

    out.push_str(&format!("Question: {question}\n"));

    if !observations.is_empty() {
        out.push_str("\nTool observations so far:\n");
        for observation in observations {
            out.push_str(&format!("- {}: {}\n", observation.tool, observation.content));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use askdb_core::routing::ToolDescriptor;

    use super::{
        crm_conversation_user, final_narration_system, primary_routing_system,
        sql_generation_system,
    };
    use crate::crm_loop::Observation;
    use crate::llm::ChatTurn;

    #[test]
    fn crm_agent_is_omitted_when_catalog_is_empty() {
        let prompt = primary_routing_system(&[]);
        assert!(!prompt.contains("\"CRM_AGENT\""));
        assert!(prompt.contains("SQL_ROUTER_AGENT"));
    }

    #[test]
    fn crm_agent_and_tools_appear_with_a_live_catalog() {
        let catalog = vec![ToolDescriptor::new("get_lead_info", "Lead by id.")];
        let prompt = primary_routing_system(&catalog);
        assert!(prompt.contains("CRM_AGENT"));
        assert!(prompt.contains("get_lead_info"));
    }

    #[test]
    fn sql_prompt_embeds_schema_and_error_sentinel() {
        let prompt = sql_generation_system("TABLE opportunities\n  id INTEGER");
        assert!(prompt.contains("TABLE opportunities"));
        assert!(prompt.contains("Error: <short reason>"));
    }

    #[test]
    fn narration_prompt_marks_missing_sql_and_error() {
        let prompt = final_narration_system(None, "(no rows)", "");
        assert!(prompt.contains("(none)"));
        assert!(prompt.contains("(no rows)"));
    }

    #[test]
    fn crm_user_prompt_threads_history_and_observations() {
        let history = vec![ChatTurn::human("hi"), ChatTurn::assistant("hello")];
        let observations =
            vec![Observation { tool: "get_lead_info".to_string(), content: "{}".to_string() }];
        let prompt = crm_conversation_user("status of LD001?", &history, &observations);
        assert!(prompt.contains("User: hi"));
        assert!(prompt.contains("Assistant: hello"));
        assert!(prompt.contains("get_lead_info"));
        assert!(prompt.contains("status of LD001?"));
    }
}
