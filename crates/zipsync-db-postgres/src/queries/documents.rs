//! Keyed document queries.

use serde_json::Value;
use sqlx_core::error::Error as SqlxError;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;

use zipsync_storage::{Document, StorageError};

use crate::error::{is_undefined_table, storage_error};

/// Fetches the documents of `table` whose key is one of `keys`.
///
/// A table that does not exist yet holds no documents, so it yields an
/// empty result rather than an error.
pub async fn find_by_keys(
    pool: &PgPool,
    table: &str,
    key_field: &str,
    keys: &[String],
) -> Result<Vec<Document>, StorageError> {
    let sql = format!(
        r#"SELECT resource FROM "{table}"
           WHERE key = ANY($1) AND resource ->> $2 = key"#
    );

    let rows: Vec<(Value,)> = match query_as(&sql)
        .bind(keys.to_vec())
        .bind(key_field)
        .fetch_all(pool)
        .await
    {
        Ok(rows) => rows,
        Err(e) if is_undefined_table(&e) => return Ok(Vec::new()),
        Err(e) => return Err(storage_error(e, &format!("Failed to read from {table}"))),
    };

    rows.into_iter()
        .map(|(resource,)| match resource {
            Value::Object(map) => Ok(map),
            other => Err(StorageError::internal(format!(
                "Stored document in {table} is not an object: {other}"
            ))),
        })
        .collect()
}

/// Upserts a batch of distinct keys in one statement.
///
/// `keys[i]` pairs with `documents[i]`. Returns each written key with `true`
/// if it was inserted. The `||` merge keeps fields of the stored document
/// that the new one does not mention. A key must not appear twice: one
/// `ON CONFLICT` statement cannot touch the same row twice.
pub async fn upsert_many(
    pool: &PgPool,
    table: &str,
    keys: Vec<String>,
    documents: Vec<Value>,
) -> Result<Vec<(String, bool)>, SqlxError> {
    let sql = format!(
        r#"INSERT INTO "{table}" AS doc (key, resource)
           SELECT input.key, input.resource
           FROM unnest($1::text[], $2::jsonb[]) AS input(key, resource)
           ON CONFLICT (key) DO UPDATE
             SET resource = doc.resource || EXCLUDED.resource,
                 updated_at = NOW()
           RETURNING doc.key, (xmax = 0) AS inserted"#
    );

    query_as::<_, (String, bool)>(&sql)
        .bind(keys)
        .bind(documents)
        .fetch_all(pool)
        .await
}
