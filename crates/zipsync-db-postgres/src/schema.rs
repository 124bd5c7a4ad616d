//! Schema management for the PostgreSQL storage backend.
//!
//! Each collection is stored in its own table. The document itself lives in a
//! JSONB column; its key is duplicated into a `TEXT PRIMARY KEY` column so an
//! upsert can rely on `ON CONFLICT (key)`.

use std::sync::Arc;

use dashmap::DashSet;
use sqlx_postgres::PgPool;
use tracing::{debug, info, instrument};

use crate::error::{PostgresError, Result};

/// Manages the per-collection tables.
///
/// Table existence is cached so that `ensure_table` costs one set lookup
/// after the first call for a collection.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    pool: PgPool,
    created_tables: Arc<DashSet<String>>,
}

impl SchemaManager {
    /// Creates a new `SchemaManager` with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            created_tables: Arc::new(DashSet::new()),
        }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Converts a collection name to a table name.
    ///
    /// Table names are lowercase and restricted to `[a-z0-9_]`, not starting
    /// with a digit, because they are interpolated into SQL.
    ///
    /// # Errors
    ///
    /// Returns `PostgresError::Config` for names outside that alphabet.
    pub fn table_name(collection: &str) -> Result<String> {
        let table = collection.to_lowercase();
        let valid = !table.is_empty()
            && !table.starts_with(|c: char| c.is_ascii_digit())
            && table
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if valid {
            Ok(table)
        } else {
            Err(PostgresError::config(format!(
                "collection name '{collection}' must match [A-Za-z_][A-Za-z0-9_]*"
            )))
        }
    }

    /// Ensures the table for `collection` exists. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the DDL fails.
    #[instrument(skip(self))]
    pub async fn ensure_table(&self, collection: &str) -> Result<String> {
        let table = Self::table_name(collection)?;

        if self.created_tables.contains(&table) {
            debug!("Table {} found in cache", table);
            return Ok(table);
        }

        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                key TEXT PRIMARY KEY,
                resource JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        );

        sqlx_core::query::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| PostgresError::Schema(format!("failed to create table {table}: {e}")))?;

        info!(collection, table = %table, "Collection table ready");
        self.created_tables.insert(table.clone());
        Ok(table)
    }
}
