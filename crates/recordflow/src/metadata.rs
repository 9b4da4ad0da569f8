//! Entity metadata consumed from the source system's schema discovery.
//!
//! The metadata collaborator hands the engine one ordered column list per
//! entity type at startup. The engine trusts the mapping: it projects
//! snapshot attributes onto destination columns and lets the destination
//! store reject anything the mapping got wrong.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use recordflow_api::Value;

/// Destination column type, used by store adapters to coerce values
/// into their native representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
    Timestamp,
}

/// Maps one source attribute onto one destination column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub destination_column: String,
    pub source_attribute: String,
    pub column_type: ColumnType,
}

/// A business column value ready to be written to the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValue {
    pub column: String,
    pub column_type: ColumnType,
    pub value: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// No column mapping exists for this entity type. Fatal for the
    /// worker that asked; other workers are unaffected.
    #[error("no column mappings for entity type '{entity_type}'")]
    UnknownEntityType { entity_type: String },
}

/// Column mappings for every configured entity type, loaded once at
/// engine start.
#[derive(Debug, Clone, Default)]
pub struct EntityMetadataCache {
    columns: HashMap<String, Vec<ColumnMapping>>,
}

impl EntityMetadataCache {
    pub fn new(columns: HashMap<String, Vec<ColumnMapping>>) -> Self {
        Self { columns }
    }

    /// Ordered column mappings for an entity type.
    pub fn columns(&self, entity_type: &str) -> Result<&[ColumnMapping], MetadataError> {
        self.columns
            .get(entity_type)
            .map(|c| c.as_slice())
            .ok_or_else(|| MetadataError::UnknownEntityType {
                entity_type: entity_type.to_string(),
            })
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }
}

/// Project an entity snapshot onto destination columns.
///
/// An attribute missing from the snapshot becomes `Value::Null`; the
/// snapshot is the full entity state, so null means cleared.
pub fn project_attributes(
    mappings: &[ColumnMapping],
    attributes: &HashMap<String, Value>,
) -> Vec<ColumnValue> {
    mappings
        .iter()
        .map(|m| ColumnValue {
            column: m.destination_column.clone(),
            column_type: m.column_type,
            value: attributes
                .get(&m.source_attribute)
                .cloned()
                .unwrap_or(Value::Null),
        })
        .collect()
}
