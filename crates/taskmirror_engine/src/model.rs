//! Parent and child-item records mirrored by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use taskmirror_store::{DocKey, Record, Revision};

/// Field names the engine owns on a stored item; never taken from the remote
/// payload.
pub(crate) const RESERVED_FIELDS: &[&str] = &["_id", "_rev", "id", "assignee"];

/// Remote field holding an item's last modification time.
pub const MODIFIED_AT_FIELD: &str = "modified_at";

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Remote-assigned identity of a parent (assignee).
    ParentId
);
numeric_id!(
    /// Remote-assigned identity of a child item.
    ItemId
);
numeric_id!(
    /// Remote scope (workspace) a single engine instance mirrors.
    ScopeId
);

impl ParentId {
    /// Returns the storage key of this parent.
    pub fn key(self) -> DocKey {
        DocKey::from_numeric(self.0)
    }
}

impl ItemId {
    /// Returns the storage key of this item.
    pub fn key(self) -> DocKey {
        DocKey::from_numeric(self.0)
    }
}

/// A parent as listed by the remote source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteParent {
    /// Remote identity.
    pub id: ParentId,
    /// Display name.
    pub name: String,
}

impl RemoteParent {
    /// Creates a remote parent.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: ParentId(id),
            name: name.into(),
        }
    }
}

/// Local record of a parent and its sync watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parent {
    /// Store revision of this record.
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub storage_revision: Option<Revision>,
    /// Remote identity.
    pub id: ParentId,
    /// Display name at first registration.
    pub name: String,
    /// Instant below which all of this parent's items are known to be
    /// captured locally. Absent until the first successful sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Parent {
    /// Creates a never-synced parent record from a remote listing.
    pub fn registered(remote: &RemoteParent) -> Self {
        Self {
            storage_revision: None,
            id: remote.id,
            name: remote.name.clone(),
            last_updated: None,
        }
    }
}

impl Record for Parent {
    fn key(&self) -> DocKey {
        self.id.key()
    }

    fn revision(&self) -> Option<&Revision> {
        self.storage_revision.as_ref()
    }

    fn set_revision(&mut self, revision: Option<Revision>) {
        self.storage_revision = revision;
    }
}

/// A mirrored work item belonging to one parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildItem {
    /// Store revision; carried forward from the prior snapshot on update.
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub storage_revision: Option<Revision>,
    /// Remote identity.
    pub id: ItemId,
    /// Parent the item was fetched under.
    #[serde(rename = "assignee")]
    pub assignee_id: ParentId,
    /// Remote attributes, as selected by the field list.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ChildItem {
    /// Creates an item without a storage revision. Reserved field names are
    /// dropped from `fields`.
    pub fn new(id: ItemId, assignee_id: ParentId, mut fields: Map<String, Value>) -> Self {
        for reserved in RESERVED_FIELDS {
            fields.remove(*reserved);
        }
        Self {
            storage_revision: None,
            id,
            assignee_id,
            fields,
        }
    }

    /// Returns a remote attribute.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns the remote modification time, if present and well-formed.
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.field(MODIFIED_AT_FIELD)
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
    }
}

impl Record for ChildItem {
    fn key(&self) -> DocKey {
        self.id.key()
    }

    fn revision(&self) -> Option<&Revision> {
        self.storage_revision.as_ref()
    }

    fn set_revision(&mut self, revision: Option<Revision>) {
        self.storage_revision = revision;
    }
}

/// Parses an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn keys_are_decimal_ids() {
        assert_eq!(ParentId(8701585143073).key().as_str(), "8701585143073");
        assert_eq!(ItemId(7).key(), DocKey::from_numeric(7));
    }

    #[test]
    fn reserved_fields_are_dropped() {
        let item = ChildItem::new(
            ItemId(1),
            ParentId(2),
            fields(json!({"id": 99, "assignee": 5, "_rev": "1-x", "name": "abc"})),
        );
        assert_eq!(item.fields.len(), 1);
        assert_eq!(item.field("name"), Some(&json!("abc")));
        assert_eq!(item.assignee_id, ParentId(2));
    }

    #[test]
    fn child_item_json_shape() {
        let mut item = ChildItem::new(ItemId(7), ParentId(42), fields(json!({"name": "abc"})));
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value, json!({"id": 7, "assignee": 42, "name": "abc"}));

        item.storage_revision = Some(Revision::new(1, "aa"));
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["_rev"], json!("1-aa"));

        let back: ChildItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn parent_json_omits_absent_watermark() {
        let parent = Parent::registered(&RemoteParent::new(5, "bill brasky"));
        let value = serde_json::to_value(&parent).unwrap();
        assert_eq!(value, json!({"id": 5, "name": "bill brasky"}));
        assert_eq!(parent.key().as_str(), "5");
    }

    #[test]
    fn modified_at_parsing() {
        let item = ChildItem::new(
            ItemId(1),
            ParentId(1),
            fields(json!({"modified_at": "2015-08-03T20:19:40.835Z"})),
        );
        let at = item.modified_at().unwrap();
        assert_eq!(at.timestamp(), 1438633180);

        let bad = ChildItem::new(ItemId(1), ParentId(1), fields(json!({"modified_at": "yesterday"})));
        assert!(bad.modified_at().is_none());
    }
}
