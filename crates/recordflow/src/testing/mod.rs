//! Test doubles for the sync engine.
//!
//! `ScriptedFeed` replays a pre-programmed page sequence with real
//! at-least-once semantics: pulling from the same cursor returns the
//! same batch again, which is exactly what batch-retry tests need.
//! `FailingDestination` injects one apply failure at a chosen point.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use recordflow_api::{ChangeBatch, ChangeFeed, ChangeItem, Cursor, FeedError};

use crate::metadata::ColumnValue;
use crate::storage::{DestinationStore, Result as StorageResult, StorageError};

#[derive(Default)]
struct Script {
    pages: Vec<Vec<ChangeItem>>,
    pending_errors: VecDeque<String>,
}

/// Cursor-addressed scripted change feed.
///
/// Pages are numbered from the beginning of the script; the cursor
/// returned with page *n* is `Token(n + 1)`. A pull past the last page
/// reports the feed as drained, and a pull from an already-served
/// position replays the identical batch.
#[derive(Default)]
pub struct ScriptedFeed {
    scripts: Mutex<HashMap<String, Script>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one page of changes for an entity type.
    pub async fn extend(&self, entity_type: &str, items: Vec<ChangeItem>) {
        assert!(!items.is_empty(), "scripted pages must be non-empty");
        self.scripts
            .lock()
            .await
            .entry(entity_type.to_string())
            .or_default()
            .pages
            .push(items);
    }

    /// Make the next pull for an entity type fail once.
    pub async fn fail_next(&self, entity_type: &str, message: &str) {
        self.scripts
            .lock()
            .await
            .entry(entity_type.to_string())
            .or_default()
            .pending_errors
            .push_back(message.to_string());
    }
}

#[async_trait]
impl ChangeFeed for ScriptedFeed {
    async fn next_batch(
        &self,
        entity_type: &str,
        cursor: &Cursor,
    ) -> std::result::Result<Option<ChangeBatch>, FeedError> {
        let mut scripts = self.scripts.lock().await;
        let script = scripts.entry(entity_type.to_string()).or_default();

        if let Some(message) = script.pending_errors.pop_front() {
            return Err(FeedError::Unreachable { message });
        }

        let position = match cursor {
            Cursor::Beginning => 0,
            Cursor::Token(t) => t.parse::<usize>().map_err(|_| FeedError::Protocol {
                message: format!("unknown cursor token '{t}'"),
            })?,
        };

        Ok(script.pages.get(position).map(|items| {
            ChangeBatch::new(
                entity_type,
                items.clone(),
                Cursor::Token((position + 1).to_string()),
            )
            .expect("scripted pages are non-empty")
        }))
    }
}

/// Destination wrapper that fails exactly one chosen apply call.
///
/// Calls are counted across `upsert` and `delete`, starting at 1; the
/// armed call fails, everything else passes through.
pub struct FailingDestination {
    inner: Arc<dyn DestinationStore>,
    calls: AtomicUsize,
    fail_at: AtomicUsize,
}

impl FailingDestination {
    pub fn new(inner: Arc<dyn DestinationStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_at: AtomicUsize::new(0),
        }
    }

    /// Arm a failure for the `n`-th apply call from now (1-indexed).
    pub fn fail_on_call(&self, n: usize) {
        self.calls.store(0, Ordering::SeqCst);
        self.fail_at.store(n, Ordering::SeqCst);
    }

    fn should_fail(&self) -> bool {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let armed = self.fail_at.load(Ordering::SeqCst);
        if armed != 0 && call == armed {
            self.fail_at.store(0, Ordering::SeqCst);
            return true;
        }
        false
    }
}

#[async_trait]
impl DestinationStore for FailingDestination {
    async fn upsert(
        &self,
        entity_type: &str,
        entity_id: &str,
        columns: &[ColumnValue],
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        if self.should_fail() {
            return Err(StorageError::QueryError("injected write failure".to_string()));
        }
        self.inner.upsert(entity_type, entity_id, columns, now).await
    }

    async fn delete(&self, entity_type: &str, entity_id: &str, now: DateTime<Utc>) -> StorageResult<()> {
        if self.should_fail() {
            return Err(StorageError::QueryError("injected write failure".to_string()));
        }
        self.inner.delete(entity_type, entity_id, now).await
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn removed(id: &str) -> ChangeItem {
        ChangeItem::Removed {
            entity_id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn scripted_feed_replays_pages_by_cursor() {
        let feed = ScriptedFeed::new();
        feed.extend("contact", vec![removed("c1")]).await;
        feed.extend("contact", vec![removed("c2")]).await;

        let first = feed
            .next_batch("contact", &Cursor::Beginning)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.cursor, Cursor::Token("1".to_string()));

        // Same position, same batch: at-least-once redelivery.
        let replay = feed
            .next_batch("contact", &Cursor::Beginning)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replay, first);

        let second = feed
            .next_batch("contact", &first.cursor)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.items[0].entity_id(), "c2");

        assert!(feed
            .next_batch("contact", &second.cursor)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn scripted_feed_fails_once_then_recovers() {
        let feed = ScriptedFeed::new();
        feed.extend("contact", vec![removed("c1")]).await;
        feed.fail_next("contact", "boom").await;

        assert!(matches!(
            feed.next_batch("contact", &Cursor::Beginning).await,
            Err(FeedError::Unreachable { .. })
        ));
        assert!(feed
            .next_batch("contact", &Cursor::Beginning)
            .await
            .unwrap()
            .is_some());
    }
}
