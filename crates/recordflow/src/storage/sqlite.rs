//! SQLite destination adapter (libsql).
//!
//! One table per entity type, named after it, with an `id` primary key,
//! the mapped business columns, and the `inserted_at`/`updated_at` audit
//! columns. Removals land in the shared `deletion_log` table. The schema
//! itself belongs to the migration collaborator; this adapter only
//! writes into it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use recordflow_api::Value;

use crate::metadata::{ColumnType, ColumnValue};
use crate::storage::destination::DestinationStore;
use crate::storage::types::Result;

pub struct SqliteDestination {
    conn: libsql::Connection,
}

impl SqliteDestination {
    pub async fn open(path: &str) -> Result<Self> {
        let db = libsql::Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        Ok(Self { conn })
    }

    pub async fn open_in_memory() -> Result<Self> {
        Self::open(":memory:").await
    }

    /// Reuse an existing connection, e.g. the one the cursor store runs on.
    pub fn with_connection(conn: libsql::Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &libsql::Connection {
        &self.conn
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Convert a projected value into its SQLite representation, guided by
/// the destination column type from the metadata mapping.
fn bind_value(column: &ColumnValue) -> libsql::Value {
    match (&column.value, column.column_type) {
        (Value::Null, _) => libsql::Value::Null,
        (Value::Boolean(b), _) => libsql::Value::Integer(i64::from(*b)),
        (Value::DateTime(dt), _) => libsql::Value::Text(dt.to_rfc3339()),
        (Value::Integer(i), ColumnType::Real) => libsql::Value::Real(*i as f64),
        (Value::Integer(i), _) => libsql::Value::Integer(*i),
        (Value::Float(f), _) => libsql::Value::Real(*f),
        (Value::String(s), _) => libsql::Value::Text(s.clone()),
        (Value::Json(j), _) => libsql::Value::Text(j.to_string()),
    }
}

#[async_trait]
impl DestinationStore for SqliteDestination {
    async fn upsert(
        &self,
        entity_type: &str,
        entity_id: &str,
        columns: &[ColumnValue],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut names = vec![quote_ident("id")];
        names.extend(columns.iter().map(|c| quote_ident(&c.column)));
        names.push(quote_ident("inserted_at"));
        names.push(quote_ident("updated_at"));

        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();

        // inserted_at is deliberately absent from the update list: the
        // conflict path must leave the first-write timestamp untouched.
        let mut updates: Vec<String> = columns
            .iter()
            .map(|c| {
                let name = quote_ident(&c.column);
                format!("{name} = excluded.{name}")
            })
            .collect();
        updates.push("\"updated_at\" = excluded.\"updated_at\"".to_string());

        let sql = format!(
            "INSERT INTO {table} ({names}) VALUES ({placeholders}) \
             ON CONFLICT(\"id\") DO UPDATE SET {updates}",
            table = quote_ident(entity_type),
            names = names.join(", "),
            placeholders = placeholders.join(", "),
            updates = updates.join(", "),
        );

        let now_text = now.to_rfc3339();
        let mut params: Vec<libsql::Value> = Vec::with_capacity(columns.len() + 3);
        params.push(libsql::Value::Text(entity_id.to_string()));
        params.extend(columns.iter().map(bind_value));
        params.push(libsql::Value::Text(now_text.clone()));
        params.push(libsql::Value::Text(now_text));

        self.conn
            .execute(&sql, libsql::params_from_iter(params))
            .await?;
        Ok(())
    }

    async fn delete(&self, entity_type: &str, entity_id: &str, now: DateTime<Utc>) -> Result<()> {
        // Row delete and log append must land together; the deletion log
        // is the tombstone even when the row never existed.
        let tx = self.conn.transaction().await?;
        tx.execute(
            &format!(
                "DELETE FROM {table} WHERE \"id\" = ?1",
                table = quote_ident(entity_type)
            ),
            libsql::params![entity_id],
        )
        .await?;
        tx.execute(
            "INSERT INTO \"deletion_log\" (\"entity_type\", \"entity_id\", \"deleted_at\") \
             VALUES (?1, ?2, ?3)",
            libsql::params![entity_type, entity_id, now.to_rfc3339()],
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }
}
