//! The one non-negotiable guard in the system: generated SQL whose leading
//! keyword mutates data is refused before it reaches a connection.

use crate::errors::WorkflowError;

const FORBIDDEN_VERBS: [&str; 7] =
    ["DELETE", "UPDATE", "INSERT", "CREATE", "ALTER", "DROP", "TRUNCATE"];

/// Returns the forbidden leading verb of `sql`, if any.
///
/// Only the first keyword is inspected, so column names like `created_at`
/// inside a SELECT never trip the guard.
pub fn forbidden_verb(sql: &str) -> Option<&'static str> {
    let first_word = sql
        .trim_start()
        .split(|ch: char| ch.is_whitespace() || ch == '(' || ch == ';')
        .next()
        .unwrap_or("");

    FORBIDDEN_VERBS.iter().copied().find(|verb| first_word.eq_ignore_ascii_case(verb))
}

/// Checks `sql` against the denylist, yielding a safety rejection on a hit.
pub fn check_read_only(sql: &str) -> Result<(), WorkflowError> {
    match forbidden_verb(sql) {
        Some(verb) => Err(WorkflowError::SafetyRejection(verb.to_string())),
        None => Ok(()),
    }
}
