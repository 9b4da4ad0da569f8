//! Cursor persistence.
//!
//! Each worker persists its resume cursor only after a batch is fully
//! applied. The in-memory store is enough for a single run; the
//! database-backed store survives restarts so workers resume instead of
//! re-syncing from the beginning.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use recordflow_api::Cursor;

use crate::storage::types::Result;

/// The serialized form of `Cursor::Beginning`.
const BEGINNING_SENTINEL: &str = "*";

#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the cursor for an entity type; `None` means first sync.
    async fn load(&self, entity_type: &str) -> Result<Option<Cursor>>;

    /// Persist the cursor for an entity type.
    async fn save(&self, entity_type: &str, cursor: &Cursor) -> Result<()>;
}

/// Volatile cursor store for single-run deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: RwLock<HashMap<String, Cursor>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self, entity_type: &str) -> Result<Option<Cursor>> {
        Ok(self.cursors.read().await.get(entity_type).cloned())
    }

    async fn save(&self, entity_type: &str, cursor: &Cursor) -> Result<()> {
        self.cursors
            .write()
            .await
            .insert(entity_type.to_string(), cursor.clone());
        Ok(())
    }
}

/// Database-backed cursor store.
///
/// Cursors live in the engine-owned `sync_cursors` table; this is the
/// only table the engine creates for itself.
pub struct DatabaseCursorStore {
    conn: libsql::Connection,
}

impl DatabaseCursorStore {
    pub fn new(conn: libsql::Connection) -> Self {
        Self { conn }
    }

    /// Create the cursor table if this is the first run against the
    /// destination database.
    pub async fn init(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS sync_cursors (
                    entity_type TEXT PRIMARY KEY,
                    cursor TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                (),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CursorStore for DatabaseCursorStore {
    async fn load(&self, entity_type: &str) -> Result<Option<Cursor>> {
        let mut rows = self
            .conn
            .query(
                "SELECT cursor FROM sync_cursors WHERE entity_type = ?1",
                libsql::params![entity_type],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let token = row.get::<String>(0)?;
                debug!(entity_type, token = %token, "loaded cursor");
                if token == BEGINNING_SENTINEL {
                    Ok(Some(Cursor::Beginning))
                } else {
                    Ok(Some(Cursor::Token(token)))
                }
            }
            None => {
                debug!(entity_type, "no cursor yet, first sync");
                Ok(None)
            }
        }
    }

    async fn save(&self, entity_type: &str, cursor: &Cursor) -> Result<()> {
        let token = match cursor {
            Cursor::Beginning => BEGINNING_SENTINEL,
            Cursor::Token(t) => t.as_str(),
        };
        self.conn
            .execute(
                "INSERT INTO sync_cursors (entity_type, cursor, updated_at)
                 VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(entity_type) DO UPDATE SET
                     cursor = excluded.cursor,
                     updated_at = excluded.updated_at",
                libsql::params![entity_type, token],
            )
            .await?;
        Ok(())
    }
}
