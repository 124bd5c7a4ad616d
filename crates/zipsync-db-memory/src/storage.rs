use std::sync::Arc;

use async_trait::async_trait;
use papaya::{Compute, HashMap as PapayaHashMap, Operation};
use serde_json::Value;
use zipsync_storage::{BulkWriteResult, Document, DocumentStore, StorageError, WriteOperation};

pub type StorageKey = String; // Format: "Collection/key"

pub(crate) fn make_storage_key(collection: &str, key: &str) -> StorageKey {
    format!("{collection}/{key}")
}

/// In-memory document store using papaya lock-free HashMap.
///
/// Each upsert runs as a single `compute` on the map, so one operation is
/// atomic with respect to concurrent writers of the same key.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    pub(crate) data: Arc<PapayaHashMap<StorageKey, Document>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
        }
    }

    /// Total number of documents across all collections.
    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads one document directly, bypassing the batched API.
    pub fn get(&self, collection: &str, key: &str) -> Option<Document> {
        self.data
            .pin()
            .get(&make_storage_key(collection, key))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find_by_keys(
        &self,
        collection: &str,
        key_field: &str,
        keys: &[String],
    ) -> Result<Vec<Document>, StorageError> {
        let guard = self.data.pin();
        let mut seen = std::collections::HashSet::new();
        let mut found = Vec::new();

        for key in keys {
            if !seen.insert(key.as_str()) {
                continue;
            }
            if let Some(doc) = guard.get(&make_storage_key(collection, key)) {
                // Documents are always stored under their key field; a mismatch
                // would mean the map was populated outside `bulk_upsert`.
                if doc.get(key_field).and_then(Value::as_str) == Some(key.as_str()) {
                    found.push(doc.clone());
                }
            }
        }

        tracing::trace!(collection, requested = keys.len(), found = found.len(), "memory lookup");
        Ok(found)
    }

    async fn bulk_upsert(
        &self,
        collection: &str,
        operations: &[WriteOperation],
    ) -> Result<BulkWriteResult, StorageError> {
        let guard = self.data.pin();
        let mut result = BulkWriteResult::default();

        for (index, op) in operations.iter().enumerate() {
            if op.set.get(&op.key_field).and_then(Value::as_str) != Some(op.key.as_str()) {
                return Err(StorageError::write_error(
                    index,
                    format!("set does not carry key field '{}'", op.key_field),
                ));
            }

            // The closure may run more than once under contention; only the
            // returned outcome says what was applied.
            let outcome = guard.compute(make_storage_key(collection, &op.key), |entry| {
                let doc = match entry {
                    Some((_, existing)) => {
                        let mut updated = existing.clone();
                        op.apply_to(&mut updated);
                        updated
                    }
                    None => op.set.clone(),
                };
                Operation::<Document, ()>::Insert(doc)
            });

            match outcome {
                Compute::Inserted(..) => result.upserted += 1,
                Compute::Updated { .. } => result.matched += 1,
                Compute::Removed(..) | Compute::Aborted(()) => {
                    return Err(StorageError::internal(format!(
                        "upsert of '{}' did not write",
                        op.key
                    )));
                }
            }
        }

        Ok(result)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
