//! Change-feed vocabulary: cursors, change items, batches, and the pull
//! contract a source connector implements.
//!
//! The feed is pull-based: `next_batch(entity_type, cursor)` returns the
//! next page of changes after `cursor`, or `None` when the source is
//! drained for this poll iteration. Re-pulling from the same cursor
//! replays at least the same items, so consumers get at-least-once
//! delivery and must apply idempotently.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Value;

/// Position in a change feed to resume from.
///
/// Opaque and monotonic per entity type. `Beginning` requests a full
/// initial sync; `Token` resumes after the last fully-applied batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Cursor {
    /// Start from the beginning: the source delivers every live entity
    /// as an upsert before streaming incremental changes.
    Beginning,
    /// Resume after the batch that produced this token.
    Token(String),
}

impl Cursor {
    pub fn as_token(&self) -> Option<&str> {
        match self {
            Cursor::Beginning => None,
            Cursor::Token(t) => Some(t),
        }
    }
}

/// One entity mutation from the source system.
///
/// Either a full snapshot of an upserted entity or a reference to a
/// removed one. The entity type is carried on the enclosing
/// [`ChangeBatch`]; batches never mix entity types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ChangeItem {
    /// Entity was created or updated; `attributes` is the full snapshot.
    Upserted {
        entity_id: String,
        attributes: HashMap<String, Value>,
    },
    /// Entity was removed from the source.
    Removed { entity_id: String },
}

impl ChangeItem {
    pub fn entity_id(&self) -> &str {
        match self {
            ChangeItem::Upserted { entity_id, .. } | ChangeItem::Removed { entity_id } => entity_id,
        }
    }
}

/// An ordered, non-empty page of changes for one entity type, plus the
/// continuation cursor that becomes valid once every item is applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeBatch {
    pub entity_type: String,
    pub items: Vec<ChangeItem>,
    pub cursor: Cursor,
}

impl ChangeBatch {
    /// Build a batch, enforcing the non-empty invariant. Returns `None`
    /// for an empty item list - sources signal "no changes" by returning
    /// no batch at all, never an empty one.
    pub fn new(entity_type: impl Into<String>, items: Vec<ChangeItem>, cursor: Cursor) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        Some(Self {
            entity_type: entity_type.into(),
            items,
            cursor,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Errors surfaced by a change feed pull.
///
/// The consumer owns retry policy; the feed never silently stalls.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The source system could not be reached.
    #[error("change source unreachable: {message}")]
    Unreachable { message: String },

    /// The source answered with something the connector cannot interpret.
    #[error("change source returned a malformed response: {message}")]
    Protocol { message: String },
}

/// Pull contract over a source system's native change-tracking API.
///
/// A subscription is just a cursor held by the caller: pulling from the
/// same cursor after a crash reproduces at least the same items, and no
/// batch is delivered out of order relative to the source's own change
/// ordering for a given entity id (last writer wins is preserved).
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Fetch the next page of changes after `cursor`.
    ///
    /// Returns `Ok(None)` when the feed is drained for this poll
    /// iteration; the caller sleeps its poll interval and pulls again.
    /// Errors are returned to the caller rather than retried internally.
    async fn next_batch(
        &self,
        entity_type: &str,
        cursor: &Cursor,
    ) -> Result<Option<ChangeBatch>, FeedError>;
}
