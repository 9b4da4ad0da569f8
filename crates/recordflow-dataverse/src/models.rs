use serde::{Deserialize, Serialize};

/// One page of the change-tracking endpoint's response.
///
/// `data_token` is the opaque resume token valid after every change in
/// this page has been applied; `more_records` signals that another page
/// is immediately available behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesPage {
    #[serde(default)]
    pub changes: Vec<EntityChange>,

    #[serde(rename = "dataToken")]
    pub data_token: String,

    #[serde(rename = "moreRecords", default)]
    pub more_records: bool,
}

/// One change entry: either a full snapshot of a new-or-updated entity
/// or a reference to a removed one. The source does not distinguish
/// create from update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityChange {
    #[serde(rename = "newOrUpdated")]
    NewOrUpdated {
        id: String,
        #[serde(default)]
        attributes: serde_json::Map<String, serde_json::Value>,
    },

    #[serde(rename = "removedOrDeleted")]
    RemovedOrDeleted { id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_mixed_change_page() {
        let page: ChangesPage = serde_json::from_str(
            r#"{
                "changes": [
                    {"type": "newOrUpdated", "id": "c1", "attributes": {"fullname": "Ann", "age": 30}},
                    {"type": "removedOrDeleted", "id": "c2"}
                ],
                "dataToken": "105!06/01/2024",
                "moreRecords": true
            }"#,
        )
        .unwrap();

        assert_eq!(page.changes.len(), 2);
        assert_eq!(page.data_token, "105!06/01/2024");
        assert!(page.more_records);
        match &page.changes[0] {
            EntityChange::NewOrUpdated { id, attributes } => {
                assert_eq!(id, "c1");
                assert_eq!(attributes["fullname"], "Ann");
            }
            other => panic!("expected newOrUpdated, got {:?}", other),
        }
        assert!(matches!(
            &page.changes[1],
            EntityChange::RemovedOrDeleted { id } if id == "c2"
        ));
    }

    #[test]
    fn missing_optional_fields_default() {
        let page: ChangesPage = serde_json::from_str(r#"{"dataToken": "t0"}"#).unwrap();
        assert!(page.changes.is_empty());
        assert!(!page.more_records);
    }
}
