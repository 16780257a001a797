//! Builds the column-level schema snapshot from SQLite's own metadata.
//!
//! Tables come from `sqlite_master`, columns from `pragma table_info`, and
//! key roles from `pragma foreign_key_list`. Internal `sqlite_*` tables are
//! excluded. The snapshot is captured once at startup; the agents never
//! query metadata live.

use askdb_core::schema::{ColumnDescriptor, KeyRole, SchemaSnapshot};
use sqlx::Row;

use crate::connection::DbPool;

pub async fn capture_snapshot(pool: &DbPool) -> Result<SchemaSnapshot, sqlx::Error> {
    let tables = sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut columns = Vec::new();
    for table in &tables {
        let foreign_keys = foreign_keys_for(pool, table).await?;
        let rows =
            sqlx::query(&format!("PRAGMA table_info({})", quote_identifier(table)))
                .fetch_all(pool)
                .await?;

        for row in rows {
            let name: String = row.try_get("name")?;
            let data_type: String = row.try_get("type")?;
            let not_null: i64 = row.try_get("notnull")?;
            let pk: i64 = row.try_get("pk")?;

            let key = if pk > 0 {
                KeyRole::Primary
            } else if let Some((referenced_table, referenced_column)) = foreign_keys
                .iter()
                .find(|(from, _, _)| from == &name)
                .map(|(_, to_table, to_column)| (to_table.clone(), to_column.clone()))
            {
                KeyRole::Foreign { referenced_table, referenced_column }
            } else {
                KeyRole::None
            };

            columns.push(ColumnDescriptor {
                table: table.clone(),
                column: name,
                data_type: normalize_type(&data_type),
                nullable: not_null == 0 && pk == 0,
                key,
            });
        }
    }

    Ok(SchemaSnapshot::new(columns))
}

/// (from_column, referenced_table, referenced_column) triples for `table`.
async fn foreign_keys_for(
    pool: &DbPool,
    table: &str,
) -> Result<Vec<(String, String, Option<String>)>, sqlx::Error> {
    let rows =
        sqlx::query(&format!("PRAGMA foreign_key_list({})", quote_identifier(table)))
            .fetch_all(pool)
            .await?;

    let mut keys = Vec::with_capacity(rows.len());
    for row in rows {
        let from: String = row.try_get("from")?;
        let to_table: String = row.try_get("table")?;
        // `to` is NULL when the reference targets the implicit primary key.
        let to_column: Option<String> = row.try_get("to")?;
        keys.push((from, to_table, to_column));
    }
    Ok(keys)
}

fn normalize_type(declared: &str) -> String {
    let trimmed = declared.trim();
    if trimmed.is_empty() {
        "ANY".to_string()
    } else {
        trimmed.to_ascii_uppercase()
    }
}

// Pragmas do not accept bound parameters; identifiers from sqlite_master are
// quoted before splicing.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
