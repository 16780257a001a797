//! Widens and narrows the schema snapshot around a routing model's hints.
//!
//! Rules, in order:
//! 1. Keep every column of every requested table (case-insensitive match).
//!    No requested table exists in the snapshot: the result is empty.
//! 2. Pull in every table referenced by a foreign key already in scope, with
//!    all of its columns. One pass, not a transitive closure.
//! 3. Ensure every primary-key column of every in-scope table is present.
//! 4. Sort by table name then column name for deterministic prompt text.
//!
//! Column hints are accepted but do not narrow the output; dropping columns
//! of a kept table loses the joins the generation model needs.

use std::collections::BTreeSet;

use super::{ColumnDescriptor, KeyRole, SchemaSnapshot};

pub(super) fn refine(
    snapshot: &SchemaSnapshot,
    relevant_tables: &[String],
    _relevant_columns: &[String],
) -> SchemaSnapshot {
    if snapshot.columns.is_empty() {
        return SchemaSnapshot { columns: Vec::new(), captured_at: snapshot.captured_at };
    }

    let requested: BTreeSet<String> =
        relevant_tables.iter().map(|name| name.to_ascii_uppercase()).collect();

    let mut kept: Vec<ColumnDescriptor> = snapshot
        .columns
        .iter()
        .filter(|descriptor| requested.contains(&descriptor.table.to_ascii_uppercase()))
        .cloned()
        .collect();

    if kept.is_empty() {
        return SchemaSnapshot { columns: Vec::new(), captured_at: snapshot.captured_at };
    }

    let mut in_scope: BTreeSet<String> =
        kept.iter().map(|descriptor| descriptor.table.to_ascii_uppercase()).collect();

    let referenced: BTreeSet<String> = kept
        .iter()
        .filter_map(|descriptor| match &descriptor.key {
            KeyRole::Foreign { referenced_table, .. } => {
                Some(referenced_table.to_ascii_uppercase())
            }
            _ => None,
        })
        .filter(|table| !in_scope.contains(table))
        .collect();

    if !referenced.is_empty() {
        for descriptor in &snapshot.columns {
            if referenced.contains(&descriptor.table.to_ascii_uppercase()) {
                kept.push(descriptor.clone());
            }
        }
        in_scope.extend(referenced);
    }

    for descriptor in &snapshot.columns {
        let is_pk = matches!(descriptor.key, KeyRole::Primary);
        if is_pk && in_scope.contains(&descriptor.table.to_ascii_uppercase()) {
            let already = kept.iter().any(|kept_descriptor| {
                kept_descriptor.table == descriptor.table
                    && kept_descriptor.column == descriptor.column
            });
            if !already {
                kept.push(descriptor.clone());
            }
        }
    }

    kept.sort_by(|a, b| a.table.cmp(&b.table).then_with(|| a.column.cmp(&b.column)));
    kept.dedup();

    SchemaSnapshot { columns: kept, captured_at: snapshot.captured_at }
}
