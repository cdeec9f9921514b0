use std::collections::hash_map::Entry;

use shared::entity::{EntityMap, EntityPatch, EntityUpdates};

/// Combines a normalized entity map with an incremental update set.
///
/// A [`EntityPatch::Delete`] removes the id entirely. An upsert for a known
/// id is a shallow field-level union where update fields overwrite
/// same-named existing fields and unspecified fields are preserved; an
/// upsert for a new id inserts the record as-is. Entries untouched by
/// `updates` carry through unchanged.
pub fn merge_entities(existing: &EntityMap, updates: EntityUpdates) -> EntityMap {
    let mut merged = existing.clone();
    for (id, patch) in updates {
        match patch {
            EntityPatch::Delete => {
                merged.remove(&id);
            }
            EntityPatch::Upsert(record) => match merged.entry(id) {
                Entry::Occupied(mut entry) => {
                    let fields = entry.get_mut();
                    for (name, value) in record {
                        fields.insert(name, value);
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(record);
                }
            },
        }
    }
    merged
}
