use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized entity: field name to value.
pub type EntityRecord = serde_json::Map<String, Value>;

/// Flat id-keyed store of entities, as opposed to nested documents.
pub type EntityMap = HashMap<EntityId, EntityRecord>;

/// An incremental change set as delivered by the data source.
pub type EntityUpdates = HashMap<EntityId, EntityPatch>;

/// What an update does to one entity: replace/merge fields, or remove it.
///
/// Deletion is its own variant rather than an overloaded empty value; the
/// legacy wire shape (JSON `null` meaning delete) still parses into
/// [`EntityPatch::Delete`].
#[derive(Debug, Clone, PartialEq)]
pub enum EntityPatch {
    Upsert(EntityRecord),
    Delete,
}

impl Serialize for EntityPatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Upsert(record) => record.serialize(serializer),
            Self::Delete => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for EntityPatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<EntityRecord>::deserialize(deserializer)? {
            Some(record) => Self::Upsert(record),
            None => Self::Delete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_parses_as_delete() {
        let updates: EntityUpdates =
            serde_json::from_value(json!({ "2": null })).expect("updates");
        assert_eq!(updates.get(&EntityId(2)), Some(&EntityPatch::Delete));
    }

    #[test]
    fn record_parses_as_upsert() {
        let updates: EntityUpdates =
            serde_json::from_value(json!({ "1": { "id": 1, "name": "foo" } })).expect("updates");
        match updates.get(&EntityId(1)) {
            Some(EntityPatch::Upsert(record)) => assert_eq!(record["name"], "foo"),
            other => panic!("expected upsert, got {other:?}"),
        }
    }

    #[test]
    fn delete_serializes_back_to_null() {
        let mut updates = EntityUpdates::new();
        updates.insert(EntityId(7), EntityPatch::Delete);
        let raw = serde_json::to_value(&updates).expect("serialize");
        assert_eq!(raw, json!({ "7": null }));
    }
}
