//! Hand-curated business vocabulary layered over the live schema.
//!
//! The schema map is a TOML file mapping conceptual keys ("customer",
//! "revenue") to tables, synonyms, and notes. At startup it is merged with
//! the live snapshot: curated text survives, column lists are refreshed,
//! entries whose table vanished are dropped, and uncovered live tables gain
//! a bare entry.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::SchemaSnapshot;

/// One conceptual entry. Entries without a `table` binding are free-form
/// notes (e.g. how to compute revenue) and survive every merge untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMapEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaMap {
    pub entries: BTreeMap<String, SchemaMapEntry>,
}

#[derive(Debug, Error)]
pub enum SchemaMapError {
    #[error("could not read schema map `{path}`: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("could not parse schema map `{path}`: {source}")]
    Parse { path: String, source: toml::de::Error },
    #[error("could not serialize schema map: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("could not write schema map `{path}`: {source}")]
    Write { path: String, source: std::io::Error },
}

impl SchemaMap {
    /// Loads the map from `path`. A missing file is an empty map, not an
    /// error; the merge will then seed entries from the live snapshot.
    pub fn load(path: &Path) -> Result<Self, SchemaMapError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| SchemaMapError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| SchemaMapError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SchemaMapError> {
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered).map_err(|source| SchemaMapError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// Reconciles curated entries with the live snapshot.
    pub fn merge_with_snapshot(&self, snapshot: &SchemaSnapshot) -> SchemaMap {
        let mut live_columns: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for descriptor in &snapshot.columns {
            live_columns
                .entry(descriptor.table.clone())
                .or_default()
                .push(descriptor.column.clone());
        }

        let mut merged = BTreeMap::new();
        let mut covered: Vec<&str> = Vec::new();

        for (key, entry) in &self.entries {
            match &entry.table {
                Some(table) => {
                    if let Some(columns) = live_columns.get(table) {
                        let mut updated = entry.clone();
                        updated.columns = columns.clone();
                        merged.insert(key.clone(), updated);
                        covered.push(table);
                    }
                    // Vanished table: the conceptual entry goes with it.
                }
                None => {
                    merged.insert(key.clone(), entry.clone());
                }
            }
        }

        for (table, columns) in &live_columns {
            if covered.iter().any(|name| name == table) {
                continue;
            }
            merged.insert(
                table.clone(),
                SchemaMapEntry {
                    table: Some(table.clone()),
                    columns: columns.clone(),
                    synonyms: Vec::new(),
                    description: None,
                },
            );
        }

        SchemaMap { entries: merged }
    }

    /// JSON rendering embedded in the schema-selection prompt.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "{}".to_string())
    }
}
