//! Bulk key lookup with placeholder fill-in.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use zipsync_storage::{Document, DocumentStore, StorageError};

use crate::entity::EntityDefinition;

/// Returns one document per input key, in input order.
///
/// Keys absent from the store yield [`EntityDefinition::placeholder`].
/// Duplicates are preserved in the output but queried once.
///
/// # Errors
///
/// Propagates the store's error; nothing is returned partially.
pub async fn lookup(
    store: &dyn DocumentStore,
    entity: &EntityDefinition,
    keys: &[String],
) -> Result<Vec<Document>, StorageError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::with_capacity(keys.len());
    let distinct: Vec<String> = keys
        .iter()
        .filter(|key| seen.insert(key.as_str()))
        .cloned()
        .collect();

    let found = store
        .find_by_keys(&entity.collection, &entity.key_field, &distinct)
        .await?;

    Ok(align(entity, keys, found))
}

/// Orders `found` after `keys`, filling gaps with placeholders.
pub fn align(entity: &EntityDefinition, keys: &[String], found: Vec<Document>) -> Vec<Document> {
    let by_key: HashMap<String, Document> = found
        .into_iter()
        .filter_map(|doc| {
            let key = doc.get(&entity.key_field).and_then(Value::as_str)?.to_string();
            Some((key, doc))
        })
        .collect();

    keys.iter()
        .map(|key| {
            by_key
                .get(key)
                .cloned()
                .unwrap_or_else(|| entity.placeholder(key))
        })
        .collect()
}
