//! Per-entity-type sync worker.
//!
//! A worker owns one entity type's cursor and is the only writer of that
//! entity type's destination table, so feed order is preserved without
//! any cross-task locking. One poll cycle drains the feed page by page;
//! each fully-applied batch advances the persisted cursor, a failed
//! batch does not, and the next cycle re-pulls it from the unchanged
//! cursor. Application is idempotent, so redelivery converges.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Span};

use recordflow_api::{ChangeBatch, ChangeFeed, ChangeItem, Cursor, FeedError};

use crate::metadata::{project_attributes, ColumnMapping, EntityMetadataCache, MetadataError};
use crate::storage::{CursorStore, DestinationStore, StorageError};
use crate::sync::clock::Clock;

/// Change counts for one poll cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStats {
    pub batches: usize,
    pub upserted: usize,
    pub removed: usize,
}

/// Errors that abort one poll cycle.
///
/// None of these kill the worker: the cycle ends, the cursor stays
/// where the last fully-applied batch left it, and the next tick
/// retries.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("change feed pull failed for '{entity_type}'")]
    Feed {
        entity_type: String,
        #[source]
        source: FeedError,
    },

    #[error("failed to apply change batch to '{entity_type}'")]
    Apply {
        entity_type: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to persist cursor for '{entity_type}'")]
    Cursor {
        entity_type: String,
        #[source]
        source: StorageError,
    },
}

pub struct SyncWorker {
    entity_type: String,
    columns: Vec<ColumnMapping>,
    feed: Arc<dyn ChangeFeed>,
    destination: Arc<dyn DestinationStore>,
    cursors: Arc<dyn CursorStore>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl SyncWorker {
    /// Build a worker for one entity type.
    ///
    /// The column mapping is resolved here, once: a worker that has no
    /// mapping cannot run at all, and the error is fatal for this worker
    /// only.
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        entity_type: String,
        metadata: &EntityMetadataCache,
        feed: Arc<dyn ChangeFeed>,
        destination: Arc<dyn DestinationStore>,
        cursors: Arc<dyn CursorStore>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Result<Self, MetadataError> {
        let columns = metadata.columns(&entity_type)?.to_vec();
        Ok(Self {
            entity_type,
            columns,
            feed,
            destination,
            cursors,
            clock,
            poll_interval,
            shutdown,
        })
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Poll-loop entry point: drain the feed, sleep, repeat until
    /// cancelled. Feed and apply failures are logged and retried at the
    /// next tick from the unchanged cursor.
    pub async fn run(&self) {
        info!(entity_type = %self.entity_type, "starting sync worker");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            match self.poll_once().await {
                Ok(stats) if stats.batches > 0 => {
                    info!(
                        entity_type = %self.entity_type,
                        batches = stats.batches,
                        upserted = stats.upserted,
                        removed = stats.removed,
                        "applied change batches"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        entity_type = %self.entity_type,
                        error = %e,
                        "poll cycle failed, retrying from the same cursor next tick"
                    );
                }
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        info!(entity_type = %self.entity_type, "sync worker stopped");
    }

    /// One poll cycle: pull batches from the current cursor until the
    /// feed is drained, applying each batch in order and persisting the
    /// cursor after each one. Returns the cycle's change counts.
    #[tracing::instrument(
        name = "sync.poll",
        skip(self),
        fields(
            entity_type = %self.entity_type,
            batches = tracing::field::Empty,
            upserted = tracing::field::Empty,
            removed = tracing::field::Empty,
        )
    )]
    pub async fn poll_once(&self) -> Result<SyncStats, SyncError> {
        let mut stats = SyncStats::default();

        let mut cursor = self
            .cursors
            .load(&self.entity_type)
            .await
            .map_err(|source| SyncError::Cursor {
                entity_type: self.entity_type.clone(),
                source,
            })?
            .unwrap_or(Cursor::Beginning);

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let batch = match self.feed.next_batch(&self.entity_type, &cursor).await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(source) => {
                    return Err(SyncError::Feed {
                        entity_type: self.entity_type.clone(),
                        source,
                    });
                }
            };

            if !self.apply_batch(&batch, &mut stats).await? {
                // Cancelled mid-batch: stop without advancing past the
                // last fully-applied batch.
                break;
            }

            cursor = batch.cursor.clone();
            self.cursors
                .save(&self.entity_type, &cursor)
                .await
                .map_err(|source| SyncError::Cursor {
                    entity_type: self.entity_type.clone(),
                    source,
                })?;
            stats.batches += 1;
        }

        let span = Span::current();
        span.record("batches", stats.batches);
        span.record("upserted", stats.upserted);
        span.record("removed", stats.removed);

        Ok(stats)
    }

    /// Apply every item of one batch in feed order. Returns `false` if
    /// cancellation interrupted the batch before the last item; the
    /// in-flight item is always allowed to complete.
    async fn apply_batch(
        &self,
        batch: &ChangeBatch,
        stats: &mut SyncStats,
    ) -> Result<bool, SyncError> {
        for item in &batch.items {
            if self.shutdown.is_cancelled() {
                return Ok(false);
            }
            match item {
                ChangeItem::Upserted {
                    entity_id,
                    attributes,
                } => {
                    let columns = project_attributes(&self.columns, attributes);
                    self.destination
                        .upsert(&self.entity_type, entity_id, &columns, self.clock.now())
                        .await
                        .map_err(|source| SyncError::Apply {
                            entity_type: self.entity_type.clone(),
                            source,
                        })?;
                    stats.upserted += 1;
                }
                ChangeItem::Removed { entity_id } => {
                    self.destination
                        .delete(&self.entity_type, entity_id, self.clock.now())
                        .await
                        .map_err(|source| SyncError::Apply {
                            entity_type: self.entity_type.clone(),
                            source,
                        })?;
                    stats.removed += 1;
                }
            }
        }
        Ok(true)
    }
}
