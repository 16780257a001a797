//! Argument extraction for model-produced tool inputs.
//!
//! Models wrap arguments in every shape imaginable: a proper object, an
//! object nested under `input`, a JSON object serialized into a string, or
//! just the bare id. Extraction walks that ladder instead of demanding one
//! canonical shape.

use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArgError {
    #[error("missing argument `{0}`")]
    Missing(&'static str),
    #[error("argument `{key}` is not {expected}: got `{found}`")]
    Invalid { key: &'static str, expected: &'static str, found: String },
}

/// Unwraps the nesting layers until something that could hold `key` remains.
/// Returns the value bound to `key`, or the bare scalar when the model sent
/// the argument without any wrapping.
fn resolve(input: &Value, key: &str) -> Option<Value> {
    match input {
        Value::Object(object) => {
            if let Some(value) = object.get(key) {
                return Some(value.clone());
            }
            if let Some(inner) = object.get("input") {
                return resolve(inner, key);
            }
            None
        }
        Value::String(text) => {
            if let Ok(parsed) = serde_json::from_str::<Value>(text) {
                if parsed.is_object() {
                    return resolve(&parsed, key);
                }
            }
            // A bare string is the argument itself.
            Some(input.clone())
        }
        Value::Number(_) => Some(input.clone()),
        _ => None,
    }
}

pub fn int_arg(input: &Value, key: &'static str) -> Result<i64, ArgError> {
    let value = resolve(input, key).ok_or(ArgError::Missing(key))?;
    match &value {
        Value::Number(number) => number.as_i64().ok_or_else(|| ArgError::Invalid {
            key,
            expected: "an integer",
            found: number.to_string(),
        }),
        Value::String(text) => text.trim().parse::<i64>().map_err(|_| ArgError::Invalid {
            key,
            expected: "an integer",
            found: text.clone(),
        }),
        other => Err(ArgError::Invalid { key, expected: "an integer", found: other.to_string() }),
    }
}

pub fn str_arg(input: &Value, key: &'static str) -> Result<String, ArgError> {
    let value = resolve(input, key).ok_or(ArgError::Missing(key))?;
    match &value {
        Value::String(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(ArgError::Invalid {
            key,
            expected: "a non-empty string",
            found: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{int_arg, str_arg, ArgError};

    #[test]
    fn reads_args_from_a_plain_object() {
        assert_eq!(int_arg(&json!({"id": 42}), "id"), Ok(42));
        assert_eq!(str_arg(&json!({"leadId": "LD001"}), "leadId"), Ok("LD001".to_string()));
    }

    #[test]
    fn unwraps_the_nested_input_object() {
        let input = json!({"input": {"opportunityId": "OPP001"}});
        assert_eq!(str_arg(&input, "opportunityId"), Ok("OPP001".to_string()));
    }

    #[test]
    fn decodes_arguments_serialized_into_a_string() {
        let input = json!(r#"{"id": "7"}"#);
        assert_eq!(int_arg(&input, "id"), Ok(7));
    }

    #[test]
    fn accepts_a_bare_scalar_as_the_argument() {
        assert_eq!(int_arg(&json!(13), "id"), Ok(13));
        assert_eq!(str_arg(&json!("LD002"), "leadId"), Ok("LD002".to_string()));
        // Numeric ids are fine where a string id is expected.
        assert_eq!(str_arg(&json!(42), "id_or_opportunity_id"), Ok("42".to_string()));
    }

    #[test]
    fn missing_and_malformed_arguments_are_distinct_errors() {
        assert_eq!(int_arg(&json!({"other": 1}), "id"), Err(ArgError::Missing("id")));
        assert!(matches!(
            int_arg(&json!({"id": "not-a-number"}), "id"),
            Err(ArgError::Invalid { key: "id", .. })
        ));
        assert_eq!(str_arg(&json!(null), "leadId"), Err(ArgError::Missing("leadId")));
    }
}
