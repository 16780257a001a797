//! SQL generation against the refined schema.

use askdb_core::errors::WorkflowError;
use askdb_core::routing::{strip_code_fences, SqlRoutingHints};
use askdb_core::SchemaSnapshot;
use tracing::debug;

use crate::llm::LlmClient;
use crate::prompts;

/// Narrows the snapshot with the routing hints and asks the model for one
/// SQL statement. An empty refinement or an `Error:` sentinel reply is a
/// failure, not a statement.
pub async fn generate_sql(
    llm: &dyn LlmClient,
    question: &str,
    snapshot: &SchemaSnapshot,
    hints: &SqlRoutingHints,
) -> Result<String, WorkflowError> {
    let refined = snapshot.refine(&hints.relevant_tables, &hints.relevant_columns);
    if refined.is_empty() {
        return Err(WorkflowError::Schema(format!(
            "no schema found for tables [{}]; they do not exist in the database",
            hints.relevant_tables.join(", ")
        )));
    }

    let system = prompts::sql_generation_system(&refined.format_for_prompt());
    let raw = llm
        .complete(&system, question)
        .await
        .map_err(|err| WorkflowError::Generation(err.to_string()))?;

    let sql = strip_code_fences(&raw);
    if sql.is_empty() {
        return Err(WorkflowError::Generation("model produced an empty statement".into()));
    }
    if sql.get(..6).is_some_and(|prefix| prefix.eq_ignore_ascii_case("error:")) {
        let reason = sql[6..].trim().to_string();
        return Err(WorkflowError::Generation(reason));
    }

    debug!(event_name = "sqlgen.statement", sql = %sql, "sql generated");
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use askdb_core::errors::WorkflowError;
    use askdb_core::routing::SqlRoutingHints;
    use askdb_core::schema::{ColumnDescriptor, KeyRole, SchemaSnapshot};
    use async_trait::async_trait;

    use super::generate_sql;
    use crate::llm::LlmClient;

    struct FixedLlm(String);

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn snapshot() -> SchemaSnapshot {
        SchemaSnapshot::new(vec![ColumnDescriptor {
            table: "opportunities".to_string(),
            column: "id".to_string(),
            data_type: "INTEGER".to_string(),
            nullable: false,
            key: KeyRole::Primary,
        }])
    }

    fn hints(tables: &[&str]) -> SqlRoutingHints {
        SqlRoutingHints {
            relevant_tables: tables.iter().map(|t| t.to_string()).collect(),
            relevant_columns: Vec::new(),
            reasoning: String::new(),
        }
    }

    #[tokio::test]
    async fn strips_fences_from_generated_sql() {
        let llm = Arc::new(FixedLlm("```sql\nSELECT * FROM opportunities;\n```".to_string()));
        let sql = generate_sql(llm.as_ref(), "list them", &snapshot(), &hints(&["opportunities"]))
            .await
            .expect("sql");
        assert_eq!(sql, "SELECT * FROM opportunities;");
    }

    #[tokio::test]
    async fn unknown_tables_fail_before_the_model_is_involved() {
        let llm = Arc::new(FixedLlm("SELECT 1".to_string()));
        let error = generate_sql(llm.as_ref(), "list them", &snapshot(), &hints(&["invoices"]))
            .await
            .unwrap_err();
        assert!(matches!(error, WorkflowError::Schema(ref detail) if detail.contains("invoices")));
    }

    #[tokio::test]
    async fn error_sentinel_reply_is_a_generation_failure() {
        let llm = Arc::new(FixedLlm("Error: question is not answerable from schema".to_string()));
        let error = generate_sql(llm.as_ref(), "weather?", &snapshot(), &hints(&["opportunities"]))
            .await
            .unwrap_err();
        assert!(matches!(error, WorkflowError::Generation(ref detail) if detail.contains("not answerable")));
    }
}
