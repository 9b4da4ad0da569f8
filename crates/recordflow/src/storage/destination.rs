//! Write contract toward the reporting store.
//!
//! One table per entity type plus one shared deletion log. Each call is a
//! single atomic write; callers re-issue calls on failure, so both
//! operations must be safely repeatable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::metadata::ColumnValue;
use crate::storage::types::Result;

#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Insert-or-update one entity row.
    ///
    /// On first write `inserted_at` and `updated_at` are both set to
    /// `now`; on every later write only `updated_at` moves, so
    /// `inserted_at <= updated_at` holds for the life of the row.
    async fn upsert(
        &self,
        entity_type: &str,
        entity_id: &str,
        columns: &[ColumnValue],
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove one entity row and append a deletion-log entry.
    ///
    /// Deleting an absent row is not an error; the log entry is appended
    /// either way, so a removal leaves a tombstone even for entities the
    /// destination never saw.
    async fn delete(&self, entity_type: &str, entity_id: &str, now: DateTime<Utc>) -> Result<()>;
}
