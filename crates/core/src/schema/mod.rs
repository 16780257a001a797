//! Database schema snapshot shared across the routing and generation agents.
//!
//! The snapshot is a flat column-level view captured once at startup: every
//! column of every user table, with its type, nullability, and key role.
//! Agents never see live metadata, only this snapshot and refinements of it.

pub mod annotations;
mod refine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key role a column plays in its table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "role")]
pub enum KeyRole {
    None,
    Primary,
    Foreign { referenced_table: String, referenced_column: Option<String> },
}

/// One column of one table, as captured by introspection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub table: String,
    pub column: String,
    pub data_type: String,
    pub nullable: bool,
    pub key: KeyRole,
}

/// A point-in-time column-level view of the whole database.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub columns: Vec<ColumnDescriptor>,
    pub captured_at: DateTime<Utc>,
}

impl SchemaSnapshot {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns, captured_at: Utc::now() }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Distinct table names, in first-seen order.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for descriptor in &self.columns {
            if !names.iter().any(|name| name == &descriptor.table) {
                names.push(descriptor.table.clone());
            }
        }
        names
    }

    /// Narrows the snapshot to the tables a routing model asked for, pulled
    /// wider by foreign-key targets and primary keys. See [`refine`] rules.
    pub fn refine(&self, relevant_tables: &[String], relevant_columns: &[String]) -> Self {
        refine::refine(self, relevant_tables, relevant_columns)
    }

    /// Renders the snapshot as the plain-text schema block used in SQL
    /// generation prompts. One line per column.
    pub fn format_for_prompt(&self) -> String {
        if self.columns.is_empty() {
            return "(no tables)".to_string();
        }

        let mut out = String::new();
        let mut current_table = "";
        for descriptor in &self.columns {
            if descriptor.table != current_table {
                if !current_table.is_empty() {
                    out.push('\n');
                }
                out.push_str(&format!("TABLE {}\n", descriptor.table));
                current_table = &descriptor.table;
            }

            let nullability = if descriptor.nullable { "NULL" } else { "NOT NULL" };
            out.push_str(&format!(
                "  {} {} {}",
                descriptor.column, descriptor.data_type, nullability
            ));
            match &descriptor.key {
                KeyRole::None => {}
                KeyRole::Primary => out.push_str(" PRIMARY KEY"),
                KeyRole::Foreign { referenced_table, referenced_column } => {
                    match referenced_column {
                        Some(column) => out
                            .push_str(&format!(" REFERENCES {referenced_table}({column})")),
                        None => out.push_str(&format!(" REFERENCES {referenced_table}")),
                    }
                }
            }
            out.push('\n');
        }

        out
    }
}

#[cfg(test)]
pub(crate) fn column(
    table: &str,
    name: &str,
    data_type: &str,
    key: KeyRole,
) -> ColumnDescriptor {
    ColumnDescriptor {
        table: table.to_string(),
        column: name.to_string(),
        data_type: data_type.to_string(),
        nullable: !matches!(key, KeyRole::Primary),
        key,
    }
}

#[cfg(test)]
mod tests {
    use super::{column, KeyRole, SchemaSnapshot};

    fn sample() -> SchemaSnapshot {
        SchemaSnapshot::new(vec![
            column("customers", "id", "INTEGER", KeyRole::Primary),
            column("customers", "name", "TEXT", KeyRole::None),
            column("opportunities", "id", "INTEGER", KeyRole::Primary),
            column(
                "opportunities",
                "customer_id",
                "INTEGER",
                KeyRole::Foreign {
                    referenced_table: "customers".to_string(),
                    referenced_column: Some("id".to_string()),
                },
            ),
        ])
    }

    #[test]
    fn table_names_preserve_first_seen_order() {
        assert_eq!(sample().table_names(), vec!["customers", "opportunities"]);
    }

    #[test]
    fn prompt_format_groups_by_table_and_marks_keys() {
        let text = sample().format_for_prompt();
        assert!(text.contains("TABLE customers"));
        assert!(text.contains("id INTEGER NOT NULL PRIMARY KEY"));
        assert!(text.contains("customer_id INTEGER NULL REFERENCES customers(id)"));
    }

    #[test]
    fn empty_snapshot_formats_as_placeholder() {
        let snapshot = SchemaSnapshot::new(Vec::new());
        assert_eq!(snapshot.format_for_prompt(), "(no tables)");
    }
}
