//! In-memory destination store.
//!
//! HashMap-based twin of the SQLite adapter, useful for single-run
//! deployments and as the reference implementation the tests assert
//! against.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use recordflow_api::Value;

use crate::metadata::ColumnValue;
use crate::storage::destination::DestinationStore;
use crate::storage::types::Result;

/// One live entity row: business columns plus the two audit columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationRow {
    pub columns: HashMap<String, Value>,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only proof that an entity was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteLogEntry {
    pub entity_type: String,
    pub entity_id: String,
    pub deleted_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryDestination {
    tables: RwLock<HashMap<String, HashMap<String, DestinationRow>>>,
    delete_log: RwLock<Vec<DeleteLogEntry>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(&self, entity_type: &str, entity_id: &str) -> Option<DestinationRow> {
        self.tables
            .read()
            .unwrap()
            .get(entity_type)
            .and_then(|t| t.get(entity_id))
            .cloned()
    }

    pub fn row_count(&self, entity_type: &str) -> usize {
        self.tables
            .read()
            .unwrap()
            .get(entity_type)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    pub fn delete_log(&self) -> Vec<DeleteLogEntry> {
        self.delete_log.read().unwrap().clone()
    }
}

#[async_trait]
impl DestinationStore for MemoryDestination {
    async fn upsert(
        &self,
        entity_type: &str,
        entity_id: &str,
        columns: &[ColumnValue],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let projected: HashMap<String, Value> = columns
            .iter()
            .map(|c| (c.column.clone(), c.value.clone()))
            .collect();

        let mut tables = self.tables.write().unwrap();
        let table = tables.entry(entity_type.to_string()).or_default();
        match table.get_mut(entity_id) {
            Some(row) => {
                row.columns = projected;
                row.updated_at = now;
            }
            None => {
                table.insert(
                    entity_id.to_string(),
                    DestinationRow {
                        columns: projected,
                        inserted_at: now,
                        updated_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn delete(&self, entity_type: &str, entity_id: &str, now: DateTime<Utc>) -> Result<()> {
        // Absent rows delete to nothing; the log entry is appended either way.
        let mut tables = self.tables.write().unwrap();
        if let Some(table) = tables.get_mut(entity_type) {
            table.remove(entity_id);
        }
        self.delete_log.write().unwrap().push(DeleteLogEntry {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            deleted_at: now,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ColumnType;
    use chrono::TimeZone;

    fn name_column(value: &str) -> Vec<ColumnValue> {
        vec![ColumnValue {
            column: "name".to_string(),
            column_type: ColumnType::Text,
            value: Value::String(value.to_string()),
        }]
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn insert_then_update_moves_only_updated_at() {
        let store = MemoryDestination::new();
        store.upsert("contact", "c1", &name_column("A"), ts(100)).await.unwrap();
        store.upsert("contact", "c1", &name_column("B"), ts(200)).await.unwrap();

        let row = store.row("contact", "c1").unwrap();
        assert_eq!(row.columns["name"], Value::String("B".to_string()));
        assert_eq!(row.inserted_at, ts(100));
        assert_eq!(row.updated_at, ts(200));
        assert_ne!(row.inserted_at, row.updated_at);
    }

    #[tokio::test]
    async fn repeated_upsert_is_idempotent_on_first_write_time() {
        let store = MemoryDestination::new();
        store.upsert("contact", "c1", &name_column("A"), ts(100)).await.unwrap();
        store.upsert("contact", "c1", &name_column("A"), ts(100)).await.unwrap();

        let row = store.row("contact", "c1").unwrap();
        assert_eq!(row.inserted_at, ts(100));
        assert_eq!(row.updated_at, ts(100));
        assert_eq!(store.row_count("contact"), 1);
    }

    #[tokio::test]
    async fn delete_removes_row_and_logs() {
        let store = MemoryDestination::new();
        store.upsert("contact", "c1", &name_column("A"), ts(100)).await.unwrap();
        store.delete("contact", "c1", ts(150)).await.unwrap();

        assert!(store.row("contact", "c1").is_none());
        let log = store.delete_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].entity_id, "c1");
        assert_eq!(log[0].deleted_at, ts(150));
    }

    #[tokio::test]
    async fn delete_of_never_seen_entity_still_logs() {
        let store = MemoryDestination::new();
        store.delete("contact", "ghost", ts(50)).await.unwrap();

        assert!(store.row("contact", "ghost").is_none());
        assert_eq!(store.delete_log().len(), 1);
        assert_eq!(store.delete_log()[0].entity_id, "ghost");
    }
}
