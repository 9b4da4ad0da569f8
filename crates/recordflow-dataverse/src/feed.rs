//! ChangeFeed adapter over the Dataverse-style changes endpoint.
//!
//! One pull maps to one HTTP page fetch. The server's `data_token`
//! becomes the continuation cursor, so re-pulling an unacknowledged
//! token replays the same page and downstream application stays
//! at-least-once.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use recordflow_api::{ChangeBatch, ChangeFeed, ChangeItem, Cursor, FeedError, Value};

use crate::client::{DataverseClient, DataverseError};
use crate::models::{ChangesPage, EntityChange};

pub struct DataverseChangeFeed {
    client: DataverseClient,
}

impl DataverseChangeFeed {
    pub fn new(client: DataverseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChangeFeed for DataverseChangeFeed {
    async fn next_batch(
        &self,
        entity_type: &str,
        cursor: &Cursor,
    ) -> Result<Option<ChangeBatch>, FeedError> {
        let page = self
            .client
            .entity_changes(entity_type, cursor.as_token())
            .await
            .map_err(|e| match e {
                DataverseError::Decode { .. } => FeedError::Protocol {
                    message: e.to_string(),
                },
                DataverseError::Transport { .. } | DataverseError::Status { .. } => {
                    FeedError::Unreachable {
                        message: e.to_string(),
                    }
                }
            })?;

        debug!(
            entity_type,
            changes = page.changes.len(),
            more_records = page.more_records,
            "fetched change page"
        );
        Ok(batch_from_page(entity_type, page))
    }
}

/// Convert one wire page into a change batch.
///
/// An empty page means the feed is drained for this poll iteration and
/// yields no batch; the caller keeps its cursor and sleeps.
pub fn batch_from_page(entity_type: &str, page: ChangesPage) -> Option<ChangeBatch> {
    let items: Vec<ChangeItem> = page
        .changes
        .into_iter()
        .map(|change| match change {
            EntityChange::NewOrUpdated { id, attributes } => ChangeItem::Upserted {
                entity_id: id,
                attributes: attributes
                    .into_iter()
                    .map(|(name, value)| (name, Value::from_json_value(value)))
                    .collect::<HashMap<_, _>>(),
            },
            EntityChange::RemovedOrDeleted { id } => ChangeItem::Removed { entity_id: id },
        })
        .collect();

    ChangeBatch::new(entity_type, items, Cursor::Token(page.data_token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(json: &str) -> ChangesPage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn maps_snapshots_and_removals_in_order() {
        let batch = batch_from_page(
            "contact",
            page(
                r#"{
                    "changes": [
                        {"type": "newOrUpdated", "id": "c1", "attributes": {"fullname": "Ann", "age": 30, "vip": true}},
                        {"type": "removedOrDeleted", "id": "c2"}
                    ],
                    "dataToken": "t42"
                }"#,
            ),
        )
        .expect("non-empty page maps to a batch");

        assert_eq!(batch.entity_type, "contact");
        assert_eq!(batch.cursor, Cursor::Token("t42".to_string()));
        match &batch.items[0] {
            ChangeItem::Upserted {
                entity_id,
                attributes,
            } => {
                assert_eq!(entity_id, "c1");
                assert_eq!(attributes["fullname"], Value::String("Ann".to_string()));
                assert_eq!(attributes["age"], Value::Integer(30));
                assert_eq!(attributes["vip"], Value::Boolean(true));
            }
            other => panic!("expected upsert, got {:?}", other),
        }
        assert_eq!(
            batch.items[1],
            ChangeItem::Removed {
                entity_id: "c2".to_string()
            }
        );
    }

    #[test]
    fn empty_page_means_drained() {
        assert!(batch_from_page("contact", page(r#"{"dataToken": "t0"}"#)).is_none());
    }

    #[test]
    fn compound_attributes_survive_as_json() {
        let batch = batch_from_page(
            "account",
            page(
                r#"{
                    "changes": [
                        {"type": "newOrUpdated", "id": "a1",
                         "attributes": {"address": {"city": "Kyiv"}, "phone": null}}
                    ],
                    "dataToken": "t1"
                }"#,
            ),
        )
        .unwrap();

        match &batch.items[0] {
            ChangeItem::Upserted { attributes, .. } => {
                assert!(matches!(attributes["address"], Value::Json(_)));
                assert_eq!(attributes["phone"], Value::Null);
            }
            other => panic!("expected upsert, got {:?}", other),
        }
    }
}
