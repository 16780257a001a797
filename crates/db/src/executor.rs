//! Read-only execution of generated SQL.
//!
//! The denylist check runs again here even though the workflow checks it
//! first; no caller path may reach a connection with a mutating statement.

use askdb_core::errors::WorkflowError;
use askdb_core::safety::check_read_only;
use askdb_core::tabulate::ResultRow;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::connection::DbPool;

/// Runs `sql` as a single read query and converts the rows to JSON maps in
/// SELECT column order.
pub async fn run_read_query(pool: &DbPool, sql: &str) -> Result<Vec<ResultRow>, WorkflowError> {
    check_read_only(sql)?;

    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .map_err(|err| WorkflowError::Execution(err.to_string()))?;

    rows.iter().map(row_to_map).collect()
}

fn row_to_map(row: &SqliteRow) -> Result<ResultRow, WorkflowError> {
    let mut map = ResultRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value =
            column_value(row, index).map_err(|err| WorkflowError::Execution(err.to_string()))?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn column_value(row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let type_name = raw.type_info().name().to_ascii_uppercase();
    let value = match type_name.as_str() {
        "INTEGER" => Value::from(row.try_get::<i64, _>(index)?),
        "BOOLEAN" => Value::from(row.try_get::<bool, _>(index)?),
        "REAL" => Value::from(row.try_get::<f64, _>(index)?),
        "BLOB" => {
            let bytes = row.try_get::<Vec<u8>, _>(index)?;
            Value::String(format!("<{} byte blob>", bytes.len()))
        }
        _ => Value::String(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use askdb_core::errors::WorkflowError;
    use serde_json::json;

    use super::run_read_query;
    use crate::connection::connect_with_settings;
    use crate::fixtures::apply_demo_dataset;

    async fn seeded_pool() -> crate::connection::DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        apply_demo_dataset(&pool).await.expect("seed");
        pool
    }

    #[tokio::test]
    async fn select_star_preserves_column_order() {
        let pool = seeded_pool().await;
        let rows = run_read_query(&pool, "SELECT id, status, estimated_value FROM opportunities ORDER BY id LIMIT 1")
            .await
            .expect("query");
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["id", "status", "estimated_value"]);
        assert_eq!(rows[0]["id"], json!(1));
    }

    #[tokio::test]
    async fn aggregates_and_nulls_convert_cleanly() {
        let pool = seeded_pool().await;
        let rows = run_read_query(
            &pool,
            "SELECT status, COUNT(*) AS count, NULL AS missing FROM opportunities GROUP BY status ORDER BY status",
        )
        .await
        .expect("query");
        assert!(!rows.is_empty());
        assert!(rows[0]["count"].is_i64());
        assert!(rows[0]["missing"].is_null());
    }

    #[tokio::test]
    async fn forbidden_statement_never_reaches_the_database() {
        let pool = seeded_pool().await;
        let error = run_read_query(&pool, "DROP TABLE customers;").await.unwrap_err();
        assert!(matches!(error, WorkflowError::SafetyRejection(ref verb) if verb == "DROP"));

        // The table is still intact.
        let rows = run_read_query(&pool, "SELECT COUNT(*) AS n FROM customers").await.expect("query");
        assert!(rows[0]["n"].as_i64().unwrap_or(0) > 0);
    }

    #[tokio::test]
    async fn execution_error_carries_database_detail() {
        let pool = seeded_pool().await;
        let error = run_read_query(&pool, "SELECT * FROM no_such_table").await.unwrap_err();
        assert!(matches!(error, WorkflowError::Execution(ref detail) if detail.contains("no_such_table")));
    }
}
