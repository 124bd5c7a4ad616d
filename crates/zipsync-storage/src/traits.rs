//! Storage traits for the document store abstraction layer.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{BulkWriteResult, Document, WriteOperation};

/// The trait every document store backend implements.
///
/// A store holds named collections of flat documents, each identified by a
/// key field. Implementations must be thread-safe (`Send + Sync`); one handle
/// is shared by all requests.
///
/// # Example
///
/// ```ignore
/// use zipsync_storage::{DocumentStore, StorageError};
///
/// async fn exists(store: &dyn DocumentStore, zip: &str) -> Result<bool, StorageError> {
///     let found = store.find_by_keys("Products", "Zip", &[zip.to_string()]).await?;
///     Ok(!found.is_empty())
/// }
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns every document of `collection` whose `key_field` equals one
    /// of `keys`, in no particular order.
    ///
    /// Keys with no matching document are simply absent from the result.
    /// Duplicate keys in the input do not produce duplicate documents.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing keys.
    async fn find_by_keys(
        &self,
        collection: &str,
        key_field: &str,
        keys: &[String],
    ) -> Result<Vec<Document>, StorageError>;

    /// Applies `operations` to `collection` in order.
    ///
    /// Each operation is atomic on its own; the batch is not. On the first
    /// failing operation the remaining ones are not attempted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::WriteError` carrying the failing index.
    async fn bulk_upsert(
        &self,
        collection: &str,
        operations: &[WriteOperation],
    ) -> Result<BulkWriteResult, StorageError>;

    /// Checks that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ConnectionError` if it is not.
    async fn ping(&self) -> Result<(), StorageError>;

    /// Releases backend resources. Called once by the process at shutdown.
    async fn close(&self) {}

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
