//! Markdown rendering of query result rows for prompts and final answers.

use serde_json::{Map, Value};

/// A single result row, column name to value, in SELECT order.
pub type ResultRow = Map<String, Value>;

/// Formats rows as a GitHub-style Markdown table. Column order follows the
/// first row; later rows missing a column render an empty cell.
pub fn rows_to_markdown(rows: &[ResultRow]) -> String {
    let Some(first) = rows.first() else {
        return "(no rows)".to_string();
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let mut out = String::new();

    out.push_str("| ");
    out.push_str(&headers.join(" | "));
    out.push_str(" |\n| ");
    out.push_str(&headers.iter().map(|_| "---").collect::<Vec<_>>().join(" | "));
    out.push_str(" |\n");

    for row in rows {
        let cells: Vec<String> =
            headers.iter().map(|name| render_cell(row.get(*name))).collect();
        out.push_str("| ");
        out.push_str(&cells.join(" | "));
        out.push_str(" |\n");
    }

    out
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.replace('|', "\\|").replace('\n', " "),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{rows_to_markdown, ResultRow};

    fn row(pairs: &[(&str, serde_json::Value)]) -> ResultRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn empty_row_set_renders_placeholder() {
        assert_eq!(rows_to_markdown(&[]), "(no rows)");
    }

    #[test]
    fn renders_header_separator_and_rows() {
        let rows = vec![
            row(&[("status", json!("Open")), ("count", json!(5))]),
            row(&[("status", json!("Closed")), ("count", json!(3))]),
        ];
        let table = rows_to_markdown(&rows);
        assert_eq!(
            table,
            "| status | count |\n| --- | --- |\n| Open | 5 |\n| Closed | 3 |\n"
        );
    }

    #[test]
    fn escapes_pipes_and_flattens_newlines_in_text_cells() {
        let rows = vec![row(&[("note", json!("a|b\nc"))])];
        let table = rows_to_markdown(&rows);
        assert!(table.contains("a\\|b c"));
    }

    #[test]
    fn missing_and_null_values_render_empty_cells() {
        let rows = vec![
            row(&[("a", json!(1)), ("b", json!("x"))]),
            row(&[("a", json!(2)), ("b", serde_json::Value::Null)]),
        ];
        let table = rows_to_markdown(&rows);
        assert!(table.contains("| 2 |  |"));
    }
}
