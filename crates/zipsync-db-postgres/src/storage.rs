//! PostgreSQL implementation of the DocumentStore trait.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use sqlx_postgres::PgPool;
use tracing::{debug, warn};

use zipsync_storage::{BulkWriteResult, Document, DocumentStore, StorageError, WriteOperation};

use crate::config::PostgresConfig;
use crate::pool;
use crate::queries;
use crate::schema::SchemaManager;

/// Distinct keys per upsert statement.
const UPSERT_CHUNK: usize = 1000;

/// All operations of a batch sharing one key, merged in batch order.
#[derive(Debug, PartialEq)]
struct Coalesced<'a> {
    /// Batch index of the first operation with this key.
    first_index: usize,
    key: &'a str,
    set: Document,
    occurrences: usize,
}

/// Folds duplicate keys so each key is written once per statement. Applying
/// the later `set` on top of the earlier one gives the same document as
/// running them in order.
fn coalesce(operations: &[WriteOperation]) -> Vec<Coalesced<'_>> {
    let mut slot_of: HashMap<&str, usize> = HashMap::with_capacity(operations.len());
    let mut pending: Vec<Coalesced<'_>> = Vec::with_capacity(operations.len());

    for (index, op) in operations.iter().enumerate() {
        if let Some(&slot) = slot_of.get(op.key.as_str()) {
            let entry = &mut pending[slot];
            op.apply_to(&mut entry.set);
            entry.occurrences += 1;
        } else {
            slot_of.insert(op.key.as_str(), pending.len());
            pending.push(Coalesced {
                first_index: index,
                key: op.key.as_str(),
                set: op.set.clone(),
                occurrences: 1,
            });
        }
    }
    pending
}

/// PostgreSQL document store: one JSONB table per collection.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    schema_manager: SchemaManager,
}

impl PostgresStore {
    /// Creates a new `PostgresStore` with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config).await?;
        Ok(Self::from_pool(pool))
    }

    /// Creates a new `PostgresStore` from an existing connection pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        let schema_manager = SchemaManager::new(pool.clone());
        Self {
            pool,
            schema_manager,
        }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the tables of the given collections up front.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection name is invalid or DDL fails.
    pub async fn ensure_collections<'a>(
        &self,
        collections: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), StorageError> {
        for collection in collections {
            self.schema_manager.ensure_table(collection).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn find_by_keys(
        &self,
        collection: &str,
        key_field: &str,
        keys: &[String],
    ) -> Result<Vec<Document>, StorageError> {
        let table = SchemaManager::table_name(collection)?;
        let docs = queries::find_by_keys(&self.pool, &table, key_field, keys).await?;
        debug!(collection, requested = keys.len(), found = docs.len(), "postgres lookup");
        Ok(docs)
    }

    async fn bulk_upsert(
        &self,
        collection: &str,
        operations: &[WriteOperation],
    ) -> Result<BulkWriteResult, StorageError> {
        let table = self.schema_manager.ensure_table(collection).await?;
        let pending = coalesce(operations);
        let mut result = BulkWriteResult::default();

        for chunk in pending.chunks(UPSERT_CHUNK) {
            let keys: Vec<String> = chunk.iter().map(|c| c.key.to_string()).collect();
            let documents: Vec<Value> = chunk.iter().map(|c| Value::Object(c.set.clone())).collect();

            let written = match queries::upsert_many(&self.pool, &table, keys, documents).await {
                Ok(written) => written,
                Err(e) => {
                    let index = chunk.first().map_or(0, |c| c.first_index);
                    warn!(collection, index, rows = chunk.len(), error = %e, "upsert failed");
                    return Err(StorageError::write_error(index, e.to_string()));
                }
            };
            let inserted: HashSet<&str> = written
                .iter()
                .filter(|(_, inserted)| *inserted)
                .map(|(key, _)| key.as_str())
                .collect();

            for entry in chunk {
                if inserted.contains(entry.key) {
                    // Later operations on the same key update what the first inserted.
                    result.upserted += 1;
                    result.matched += entry.occurrences - 1;
                } else {
                    result.matched += entry.occurrences;
                }
            }
        }

        debug!(
            collection,
            operations = operations.len(),
            distinct = pending.len(),
            matched = result.matched,
            upserted = result.upserted,
            "postgres bulk upsert"
        );
        Ok(result)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        pool::ping(&self.pool).await.map_err(Into::into)
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(zip: &str, set: Value) -> WriteOperation {
        WriteOperation::upsert("Zip", zip, set.as_object().cloned().expect("object"))
    }

    #[test]
    fn coalesce_merges_duplicate_keys_in_order() {
        let ops = vec![
            op("10001", json!({"Product": "First", "Recorded": "2023"})),
            op("20002", json!({"Product": "Gadget"})),
            op("10001", json!({"Product": "Second"})),
        ];

        let pending = coalesce(&ops);

        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].key, "10001");
        assert_eq!(pending[0].first_index, 0);
        assert_eq!(pending[0].occurrences, 2);
        assert_eq!(
            Value::Object(pending[0].set.clone()),
            json!({"Zip": "10001", "Product": "Second", "Recorded": "2023"})
        );
        assert_eq!(pending[1].key, "20002");
        assert_eq!(pending[1].first_index, 1);
        assert_eq!(pending[1].occurrences, 1);
    }

    #[test]
    fn coalesce_of_empty_batch_is_empty() {
        assert!(coalesce(&[]).is_empty());
    }
}
